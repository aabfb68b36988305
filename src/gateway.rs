// Exchange Gateway Integration
//
// This module abstracts how the engine talks to the exchange. The core is
// agnostic to whether orders go to Binance futures, a testnet, or the bundled
// simulator; auth, signing, and transport all live behind this trait. Calls
// are synchronous request/response with bounded timeouts enforced by the
// implementation.

use crate::order::{Order, OrderStatus, OrderType, TimeInForce};
use crate::rules::SymbolRules;
use crate::types::{ExchangeOrderId, OrderHandle, Price, Side, Symbol};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Wire-level order placement request.
///
/// `client_id` is the tracker's handle for the order. The exchange echoes it
/// back, which is what makes an ambiguous (timed-out) placement reconcilable:
/// the order can be looked up by client id even before an exchange id is known.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    pub client_id: OrderHandle,
    pub symbol: Symbol,
    pub side: Side,
    pub order_type: OrderType,
    pub quantity: Decimal,
    pub price: Option<Price>,
    pub stop_price: Option<Price>,
    pub time_in_force: TimeInForce,
    pub reduce_only: bool,
}

impl OrderRequest {
    pub fn from_order(order: &Order) -> Self {
        Self {
            client_id: order.handle,
            symbol: order.symbol.clone(),
            side: order.side,
            order_type: order.order_type,
            quantity: order.quantity,
            price: order.price,
            stop_price: order.stop_price,
            time_in_force: order.time_in_force,
            reduce_only: order.reduce_only,
        }
    }
}

/// Placement acknowledgement. Market orders report their execution here,
/// in the placement response itself, the way Binance futures does.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PlaceAck {
    pub exchange_order_id: ExchangeOrderId,
    pub status: OrderStatus,
    pub executed_quantity: Decimal,
    pub average_price: Option<Price>,
}

/// Point-in-time view of an order as the exchange reports it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OrderSnapshot {
    pub exchange_order_id: ExchangeOrderId,
    pub status: OrderStatus,
    pub executed_quantity: Decimal,
    pub average_price: Option<Price>,
}

/// Keys for a status query. The exchange id is preferred when known; the
/// client id resolves orders whose placement outcome was never observed.
#[derive(Debug, Clone, Copy)]
pub struct OrderLookup {
    pub exchange_id: Option<ExchangeOrderId>,
    pub client_id: OrderHandle,
}

/// Gateway failure taxonomy.
///
/// The distinction drives retry policy: `Transient` is retried with backoff,
/// `Timeout` means the outcome is unknown and must be reconciled before any
/// retry, and `Rejected` is the exchange saying no - never retried.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GatewayError {
    #[error("transient gateway error: {0}")]
    Transient(String),

    #[error("gateway call timed out, outcome unknown")]
    Timeout,

    #[error("order rejected by exchange: {0}")]
    Rejected(String),

    #[error("order not known to the exchange")]
    UnknownOrder,

    #[error("symbol {0} not listed")]
    UnknownSymbol(Symbol),
}

impl GatewayError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, GatewayError::Transient(_))
    }
}

/// Synchronous exchange operations. Implementations handle auth/signing and
/// raw transport; every call is expected to return within a bounded timeout.
pub trait ExchangeGateway {
    fn place_order(&mut self, request: &OrderRequest) -> Result<PlaceAck, GatewayError>;

    fn cancel_order(
        &mut self,
        symbol: &Symbol,
        exchange_id: ExchangeOrderId,
    ) -> Result<OrderStatus, GatewayError>;

    fn order_status(
        &mut self,
        symbol: &Symbol,
        lookup: &OrderLookup,
    ) -> Result<OrderSnapshot, GatewayError>;

    fn mark_price(&mut self, symbol: &Symbol) -> Result<Price, GatewayError>;

    fn symbol_rules(&mut self, symbol: &Symbol) -> Result<SymbolRules, GatewayError>;
}

/// Dry-run gateway: every call succeeds without reaching an exchange.
///
/// Market orders pretend to fill at the configured mark price; resting orders
/// acknowledge and then sit as NEW forever. Order ids start in a synthetic
/// range so logs are obviously simulated.
pub struct NoopGateway {
    mark: Price,
    rules: SymbolRules,
    next_id: u64,
    acked: HashMap<OrderHandle, OrderSnapshot>,
}

impl NoopGateway {
    pub fn new(mark: Price, rules: SymbolRules) -> Self {
        Self {
            mark,
            rules,
            next_id: 9_999_000,
            acked: HashMap::new(),
        }
    }

    pub fn set_mark_price(&mut self, mark: Price) {
        self.mark = mark;
    }
}

impl ExchangeGateway for NoopGateway {
    fn place_order(&mut self, request: &OrderRequest) -> Result<PlaceAck, GatewayError> {
        let exchange_order_id = ExchangeOrderId(self.next_id);
        self.next_id += 1;

        let snapshot = match request.order_type {
            OrderType::Market => OrderSnapshot {
                exchange_order_id,
                status: OrderStatus::Filled,
                executed_quantity: request.quantity,
                average_price: Some(self.mark),
            },
            OrderType::Limit | OrderType::StopLimit => OrderSnapshot {
                exchange_order_id,
                status: OrderStatus::New,
                executed_quantity: Decimal::ZERO,
                average_price: None,
            },
        };
        self.acked.insert(request.client_id, snapshot);

        Ok(PlaceAck {
            exchange_order_id,
            status: snapshot.status,
            executed_quantity: snapshot.executed_quantity,
            average_price: snapshot.average_price,
        })
    }

    fn cancel_order(
        &mut self,
        _symbol: &Symbol,
        _exchange_id: ExchangeOrderId,
    ) -> Result<OrderStatus, GatewayError> {
        Ok(OrderStatus::Canceled)
    }

    fn order_status(
        &mut self,
        _symbol: &Symbol,
        lookup: &OrderLookup,
    ) -> Result<OrderSnapshot, GatewayError> {
        self.acked
            .get(&lookup.client_id)
            .copied()
            .ok_or(GatewayError::UnknownOrder)
    }

    fn mark_price(&mut self, _symbol: &Symbol) -> Result<Price, GatewayError> {
        Ok(self.mark)
    }

    fn symbol_rules(&mut self, _symbol: &Symbol) -> Result<SymbolRules, GatewayError> {
        Ok(self.rules.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn noop() -> NoopGateway {
        NoopGateway::new(Price::new_unchecked(dec!(50000)), SymbolRules::btc_usdt())
    }

    #[test]
    fn noop_market_order_fills_at_mark() {
        let mut gw = noop();
        let request = OrderRequest {
            client_id: OrderHandle(1),
            symbol: Symbol::new("BTCUSDT"),
            side: Side::Buy,
            order_type: OrderType::Market,
            quantity: dec!(0.5),
            price: None,
            stop_price: None,
            time_in_force: TimeInForce::Ioc,
            reduce_only: false,
        };

        let ack = gw.place_order(&request).unwrap();
        assert_eq!(ack.status, OrderStatus::Filled);

        let snap = gw
            .order_status(
                &request.symbol,
                &OrderLookup {
                    exchange_id: Some(ack.exchange_order_id),
                    client_id: OrderHandle(1),
                },
            )
            .unwrap();
        assert_eq!(snap.executed_quantity, dec!(0.5));
        assert_eq!(snap.average_price.unwrap().value(), dec!(50000));
    }

    #[test]
    fn noop_limit_order_rests() {
        let mut gw = noop();
        let request = OrderRequest {
            client_id: OrderHandle(2),
            symbol: Symbol::new("BTCUSDT"),
            side: Side::Sell,
            order_type: OrderType::Limit,
            quantity: dec!(1),
            price: Some(Price::new_unchecked(dec!(51000))),
            stop_price: None,
            time_in_force: TimeInForce::Gtc,
            reduce_only: false,
        };

        let ack = gw.place_order(&request).unwrap();
        assert_eq!(ack.status, OrderStatus::New);
        assert!(ack.exchange_order_id.0 >= 9_999_000);
    }

    #[test]
    fn transient_errors_are_the_only_retryable_kind() {
        assert!(GatewayError::Transient("rate limited".into()).is_retryable());
        assert!(!GatewayError::Timeout.is_retryable());
        assert!(!GatewayError::Rejected("margin".into()).is_retryable());
    }
}
