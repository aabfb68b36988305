//! Client-side order state.
//!
//! An `Order` here is the bot's view of an exchange order: what was requested,
//! what the exchange acknowledged, and the last status observed. Orders are
//! owned exclusively by the `OrderTracker`; strategy code holds `OrderHandle`s.

use crate::types::{ExchangeOrderId, OrderHandle, Price, Side, Symbol, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Order time in force options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeInForce {
    /// Good till canceled. Remains on book until filled or canceled.
    Gtc,
    /// Immediate or cancel. Fill what is possible, cancel the rest.
    Ioc,
    /// Fill or kill. Fill entirely or cancel entirely.
    Fok,
}

impl Default for TimeInForce {
    fn default() -> Self {
        Self::Gtc
    }
}

/// Order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    /// Executes at the best available price.
    Market,
    /// Limit order at a specified price.
    Limit,
    /// Exchange-held stop: converts to a limit order when the stop price trades.
    StopLimit,
}

/// Order lifecycle status as reported by the exchange.
///
/// `Pending` is the one client-only state: the order exists in the tracker but
/// has not been acknowledged. Everything else mirrors exchange reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    New,
    PartiallyFilled,
    Filled,
    Canceled,
    Rejected,
    Expired,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled
                | OrderStatus::Canceled
                | OrderStatus::Rejected
                | OrderStatus::Expired
        )
    }

    /// Resting on the book, can still fill.
    pub fn is_live(&self) -> bool {
        matches!(self, OrderStatus::New | OrderStatus::PartiallyFilled)
    }

    // Ordering used to keep updates monotonic. A status may only move to an
    // equal or higher rank, and never out of a terminal state.
    fn rank(&self) -> u8 {
        match self {
            OrderStatus::Pending => 0,
            OrderStatus::New => 1,
            OrderStatus::PartiallyFilled => 2,
            OrderStatus::Filled
            | OrderStatus::Canceled
            | OrderStatus::Rejected
            | OrderStatus::Expired => 3,
        }
    }
}

/// What a strategy asks the exchange for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderSpec {
    pub symbol: Symbol,
    pub side: Side,
    pub order_type: OrderType,
    pub quantity: Decimal,
    pub price: Option<Price>,
    pub stop_price: Option<Price>,
    pub time_in_force: TimeInForce,
    /// Only reduces an existing position (used by OCO exit legs).
    pub reduce_only: bool,
}

impl OrderSpec {
    pub fn market(symbol: Symbol, side: Side, quantity: Decimal) -> Self {
        Self {
            symbol,
            side,
            order_type: OrderType::Market,
            quantity,
            price: None,
            stop_price: None,
            time_in_force: TimeInForce::Ioc,
            reduce_only: false,
        }
    }

    pub fn limit(
        symbol: Symbol,
        side: Side,
        quantity: Decimal,
        price: Price,
        time_in_force: TimeInForce,
    ) -> Self {
        Self {
            symbol,
            side,
            order_type: OrderType::Limit,
            quantity,
            price: Some(price),
            stop_price: None,
            time_in_force,
            reduce_only: false,
        }
    }

    pub fn stop_limit(
        symbol: Symbol,
        side: Side,
        quantity: Decimal,
        stop_price: Price,
        limit_price: Price,
    ) -> Self {
        Self {
            symbol,
            side,
            order_type: OrderType::StopLimit,
            quantity,
            price: Some(limit_price),
            stop_price: Some(stop_price),
            time_in_force: TimeInForce::Gtc,
            reduce_only: false,
        }
    }

    pub fn reduce_only(mut self) -> Self {
        self.reduce_only = true;
        self
    }
}

/// A tracked order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub handle: OrderHandle,
    pub symbol: Symbol,
    pub side: Side,
    pub order_type: OrderType,
    pub quantity: Decimal,
    pub price: Option<Price>,
    pub stop_price: Option<Price>,
    pub time_in_force: TimeInForce,
    pub reduce_only: bool,
    pub exchange_id: Option<ExchangeOrderId>,
    pub status: OrderStatus,
    pub executed_quantity: Decimal,
    pub average_fill_price: Option<Price>,
    pub reject_reason: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Order {
    pub fn from_spec(handle: OrderHandle, spec: OrderSpec, now: Timestamp) -> Self {
        Self {
            handle,
            symbol: spec.symbol,
            side: spec.side,
            order_type: spec.order_type,
            quantity: spec.quantity,
            price: spec.price,
            stop_price: spec.stop_price,
            time_in_force: spec.time_in_force,
            reduce_only: spec.reduce_only,
            exchange_id: None,
            status: OrderStatus::Pending,
            executed_quantity: Decimal::ZERO,
            average_fill_price: None,
            reject_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn is_live(&self) -> bool {
        self.status.is_live()
    }

    /// Apply a status observation. Terminal states stick; the status rank
    /// never decreases, so a stale report cannot drag a filled order back.
    pub fn apply_status(&mut self, status: OrderStatus, now: Timestamp) {
        if self.status.is_terminal() {
            return;
        }
        if status.rank() >= self.status.rank() {
            self.status = status;
            self.updated_at = now;
        }
    }

    /// Record observed execution progress. Executed quantity is monotonic.
    pub fn apply_fill(
        &mut self,
        executed_quantity: Decimal,
        average_fill_price: Option<Price>,
        now: Timestamp,
    ) {
        if executed_quantity > self.executed_quantity {
            self.executed_quantity = executed_quantity;
            self.updated_at = now;
        }
        if average_fill_price.is_some() {
            self.average_fill_price = average_fill_price;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn limit_order() -> Order {
        let spec = OrderSpec::limit(
            Symbol::new("BTCUSDT"),
            Side::Buy,
            dec!(0.5),
            Price::new_unchecked(dec!(50000)),
            TimeInForce::Gtc,
        );
        Order::from_spec(OrderHandle(1), spec, Timestamp::from_millis(0))
    }

    #[test]
    fn market_spec_defaults_to_ioc() {
        let spec = OrderSpec::market(Symbol::new("BTCUSDT"), Side::Sell, dec!(1));
        assert_eq!(spec.time_in_force, TimeInForce::Ioc);
        assert!(spec.price.is_none());
    }

    #[test]
    fn status_progresses_forward() {
        let mut order = limit_order();
        order.apply_status(OrderStatus::New, Timestamp::from_millis(1));
        order.apply_status(OrderStatus::PartiallyFilled, Timestamp::from_millis(2));
        assert_eq!(order.status, OrderStatus::PartiallyFilled);

        // stale report cannot regress the status
        order.apply_status(OrderStatus::New, Timestamp::from_millis(3));
        assert_eq!(order.status, OrderStatus::PartiallyFilled);
    }

    #[test]
    fn terminal_status_sticks() {
        let mut order = limit_order();
        order.apply_status(OrderStatus::Filled, Timestamp::from_millis(1));
        order.apply_status(OrderStatus::Canceled, Timestamp::from_millis(2));
        assert_eq!(order.status, OrderStatus::Filled);
        assert!(order.is_terminal());
    }

    #[test]
    fn executed_quantity_is_monotonic() {
        let mut order = limit_order();
        order.apply_fill(dec!(0.2), Some(Price::new_unchecked(dec!(50000))), Timestamp::from_millis(1));
        order.apply_fill(dec!(0.1), None, Timestamp::from_millis(2));
        assert_eq!(order.executed_quantity, dec!(0.2));
    }
}
