//! Order tracker: the in-memory registry of every order the engine has asked
//! for, keyed by handle. The tracker owns all `Order` state; strategies only
//! ever see handles and read-only views.
//!
//! Status updates are monotonic (a terminal order never changes again) and
//! `cancel` is idempotent: cancelling an already-terminal order is a no-op
//! success.

use crate::gateway::{ExchangeGateway, GatewayError, OrderLookup, OrderRequest};
use crate::order::{Order, OrderSpec, OrderStatus};
use crate::types::{OrderHandle, Timestamp};
use std::collections::HashMap;

/// Outcome of looking up an order after an ambiguous (timed-out) placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// The order landed on the exchange; its id and status were adopted.
    Found,
    /// The exchange has no such order; the placement never happened and it is
    /// safe to submit again.
    NotFound,
}

#[derive(Debug, Default)]
pub struct OrderTracker {
    orders: HashMap<OrderHandle, Order>,
    next_handle: u64,
}

impl OrderTracker {
    pub fn new() -> Self {
        Self {
            orders: HashMap::new(),
            next_handle: 1,
        }
    }

    /// Register a new order in `Pending` state and return its handle.
    pub fn create(&mut self, spec: OrderSpec, now: Timestamp) -> OrderHandle {
        let handle = OrderHandle(self.next_handle);
        self.next_handle += 1;
        self.orders.insert(handle, Order::from_spec(handle, spec, now));
        handle
    }

    pub fn get(&self, handle: OrderHandle) -> Option<&Order> {
        self.orders.get(&handle)
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// All orders currently resting on the exchange.
    pub fn live_handles(&self) -> Vec<OrderHandle> {
        let mut handles: Vec<OrderHandle> = self
            .orders
            .values()
            .filter(|o| o.is_live())
            .map(|o| o.handle)
            .collect();
        handles.sort();
        handles
    }

    fn order_mut(&mut self, handle: OrderHandle) -> &mut Order {
        self.orders
            .get_mut(&handle)
            .expect("order handle not in tracker")
    }

    /// Submit a created order to the exchange.
    ///
    /// An explicit exchange rejection is recorded on the order (status
    /// `Rejected` plus the reason) and returned as `Ok` - rejection is data,
    /// and the caller decides whether it is fatal to the plan. Transient and
    /// timeout failures propagate so the shared retry layer can act.
    pub fn place<G: ExchangeGateway>(
        &mut self,
        gateway: &mut G,
        handle: OrderHandle,
        now: Timestamp,
    ) -> Result<&Order, GatewayError> {
        let request = OrderRequest::from_order(self.order_mut(handle));
        match gateway.place_order(&request) {
            Ok(ack) => {
                let order = self.order_mut(handle);
                order.exchange_id = Some(ack.exchange_order_id);
                order.apply_fill(ack.executed_quantity, ack.average_price, now);
                order.apply_status(ack.status, now);
                Ok(&*order)
            }
            Err(GatewayError::Rejected(reason)) => {
                let order = self.order_mut(handle);
                order.reject_reason = Some(reason);
                order.apply_status(OrderStatus::Rejected, now);
                Ok(&*order)
            }
            Err(e) => Err(e),
        }
    }

    /// Re-query an order's status from the exchange. Terminal orders are not
    /// re-queried; observed updates apply monotonically.
    pub fn refresh<G: ExchangeGateway>(
        &mut self,
        gateway: &mut G,
        handle: OrderHandle,
        now: Timestamp,
    ) -> Result<&Order, GatewayError> {
        let (symbol, lookup, terminal) = {
            let order = self.order_mut(handle);
            (
                order.symbol.clone(),
                OrderLookup {
                    exchange_id: order.exchange_id,
                    client_id: handle,
                },
                order.is_terminal(),
            )
        };
        if terminal {
            return Ok(&*self.order_mut(handle));
        }

        let snapshot = gateway.order_status(&symbol, &lookup)?;
        let order = self.order_mut(handle);
        order.exchange_id = Some(snapshot.exchange_order_id);
        order.apply_fill(snapshot.executed_quantity, snapshot.average_price, now);
        order.apply_status(snapshot.status, now);
        Ok(&*order)
    }

    /// Cancel an order. Idempotent: an already-terminal order (including one
    /// cancelled moments ago) is a no-op success, and an order the exchange
    /// no longer knows is treated as already gone.
    pub fn cancel<G: ExchangeGateway>(
        &mut self,
        gateway: &mut G,
        handle: OrderHandle,
        now: Timestamp,
    ) -> Result<&Order, GatewayError> {
        let (symbol, exchange_id, terminal) = {
            let order = self.order_mut(handle);
            (order.symbol.clone(), order.exchange_id, order.is_terminal())
        };
        if terminal {
            return Ok(&*self.order_mut(handle));
        }

        let Some(exchange_id) = exchange_id else {
            // never reached the exchange; nothing to cancel remotely
            let order = self.order_mut(handle);
            order.apply_status(OrderStatus::Canceled, now);
            return Ok(&*order);
        };

        match gateway.cancel_order(&symbol, exchange_id) {
            Ok(status) => {
                let order = self.order_mut(handle);
                order.apply_status(status, now);
                Ok(&*order)
            }
            Err(GatewayError::UnknownOrder) => {
                let order = self.order_mut(handle);
                order.apply_status(OrderStatus::Canceled, now);
                Ok(&*order)
            }
            Err(e) => Err(e),
        }
    }

    /// Resolve an order whose placement timed out. Looks the order up by its
    /// client id; `Found` adopts the exchange state, `NotFound` proves the
    /// submission never landed.
    pub fn reconcile<G: ExchangeGateway>(
        &mut self,
        gateway: &mut G,
        handle: OrderHandle,
        now: Timestamp,
    ) -> Result<Reconciliation, GatewayError> {
        let symbol = self.order_mut(handle).symbol.clone();
        let lookup = OrderLookup {
            exchange_id: None,
            client_id: handle,
        };
        match gateway.order_status(&symbol, &lookup) {
            Ok(snapshot) => {
                let order = self.order_mut(handle);
                order.exchange_id = Some(snapshot.exchange_order_id);
                order.apply_fill(snapshot.executed_quantity, snapshot.average_price, now);
                order.apply_status(snapshot.status, now);
                Ok(Reconciliation::Found)
            }
            Err(GatewayError::UnknownOrder) => Ok(Reconciliation::NotFound),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::NoopGateway;
    use crate::order::OrderSpec;
    use crate::rules::SymbolRules;
    use crate::types::{Price, Side, Symbol};
    use rust_decimal_macros::dec;

    fn gateway() -> NoopGateway {
        NoopGateway::new(Price::new_unchecked(dec!(50000)), SymbolRules::btc_usdt())
    }

    fn limit_spec() -> OrderSpec {
        OrderSpec::limit(
            Symbol::new("BTCUSDT"),
            Side::Buy,
            dec!(0.01),
            Price::new_unchecked(dec!(49000)),
            crate::order::TimeInForce::Gtc,
        )
    }

    #[test]
    fn place_records_exchange_id() {
        let mut tracker = OrderTracker::new();
        let mut gw = gateway();

        let handle = tracker.create(limit_spec(), Timestamp::from_millis(0));
        let order = tracker.place(&mut gw, handle, Timestamp::from_millis(1)).unwrap();

        assert_eq!(order.status, OrderStatus::New);
        assert!(order.exchange_id.is_some());
    }

    #[test]
    fn cancel_twice_is_idempotent() {
        let mut tracker = OrderTracker::new();
        let mut gw = gateway();

        let handle = tracker.create(limit_spec(), Timestamp::from_millis(0));
        tracker.place(&mut gw, handle, Timestamp::from_millis(1)).unwrap();

        let first = tracker.cancel(&mut gw, handle, Timestamp::from_millis(2)).unwrap();
        assert_eq!(first.status, OrderStatus::Canceled);

        let second = tracker.cancel(&mut gw, handle, Timestamp::from_millis(3)).unwrap();
        assert_eq!(second.status, OrderStatus::Canceled);
    }

    #[test]
    fn cancel_before_placement_is_local() {
        let mut tracker = OrderTracker::new();
        let mut gw = gateway();

        let handle = tracker.create(limit_spec(), Timestamp::from_millis(0));
        let order = tracker.cancel(&mut gw, handle, Timestamp::from_millis(1)).unwrap();
        assert_eq!(order.status, OrderStatus::Canceled);
    }

    #[test]
    fn live_handles_excludes_terminal_orders() {
        let mut tracker = OrderTracker::new();
        let mut gw = gateway();

        let a = tracker.create(limit_spec(), Timestamp::from_millis(0));
        let b = tracker.create(limit_spec(), Timestamp::from_millis(0));
        tracker.place(&mut gw, a, Timestamp::from_millis(1)).unwrap();
        tracker.place(&mut gw, b, Timestamp::from_millis(1)).unwrap();
        tracker.cancel(&mut gw, b, Timestamp::from_millis(2)).unwrap();

        assert_eq!(tracker.live_handles(), vec![a]);
    }
}
