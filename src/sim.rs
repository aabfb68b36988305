// Simulated exchange for tests and the exec-sim binary.
//
// One `SimWorld` is the whole market: current time, a scripted mark-price
// path, and every order the engine has placed. `SimGateway` and `SimClock`
// are views over the shared world, so sleeping the engine's clock is what
// moves prices and fills resting orders - fully deterministic, no real time.

use crate::clock::{CancelToken, Clock};
use crate::engine::stop_condition_met;
use crate::gateway::{
    ExchangeGateway, GatewayError, OrderLookup, OrderRequest, OrderSnapshot, PlaceAck,
};
use crate::order::{OrderStatus, OrderType};
use crate::rules::SymbolRules;
use crate::types::{ExchangeOrderId, OrderHandle, Price, Side, Symbol, Timestamp};
use rust_decimal::Decimal;
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use std::time::Duration;

/// Per-call behavior for upcoming `place_order` calls; one queue entry is
/// consumed per call.
#[derive(Debug, Clone)]
pub enum SimFault {
    /// Let this call through unharmed (used to aim a fault at a later call).
    Pass,
    /// Network-ish failure; the order does not land.
    Transient(String),
    /// The call times out. `lands` controls whether the order actually
    /// reached the exchange, which is exactly what reconciliation must
    /// distinguish.
    Timeout { lands: bool },
    /// Explicit exchange rejection.
    Reject(String),
}

#[derive(Debug, Clone)]
struct SimOrder {
    exchange_id: u64,
    client_id: OrderHandle,
    symbol: Symbol,
    side: Side,
    order_type: OrderType,
    quantity: Decimal,
    limit_price: Option<Decimal>,
    stop_price: Option<Decimal>,
    status: OrderStatus,
    executed: Decimal,
    avg_price: Option<Decimal>,
    /// Stop-limit only: the stop has fired and the order now rests as a limit.
    triggered: bool,
}

impl SimOrder {
    fn snapshot(&self) -> OrderSnapshot {
        OrderSnapshot {
            exchange_order_id: ExchangeOrderId(self.exchange_id),
            status: self.status,
            executed_quantity: self.executed,
            average_price: self.avg_price.map(Price::new_unchecked),
        }
    }
}

#[derive(Debug)]
pub struct SimWorld {
    now_ms: i64,
    marks: HashMap<Symbol, Decimal>,
    rules: HashMap<Symbol, SymbolRules>,
    /// Future mark updates: (at_ms, symbol, price), sorted by time.
    schedule: Vec<(i64, Symbol, Decimal)>,
    orders: HashMap<u64, SimOrder>,
    by_client: HashMap<OrderHandle, u64>,
    next_id: u64,
    faults: VecDeque<SimFault>,
    cancel_at: Option<(i64, CancelToken)>,
}

impl SimWorld {
    pub fn new() -> Self {
        Self {
            now_ms: 0,
            marks: HashMap::new(),
            rules: HashMap::new(),
            schedule: Vec::new(),
            orders: HashMap::new(),
            by_client: HashMap::new(),
            next_id: 1,
            faults: VecDeque::new(),
            cancel_at: None,
        }
    }

    /// List a symbol with its rules and starting mark price.
    pub fn list_symbol(&mut self, symbol: Symbol, rules: SymbolRules, mark: Decimal) {
        self.marks.insert(symbol.clone(), mark);
        self.rules.insert(symbol, rules);
    }

    /// Schedule a mark-price change at an absolute sim time.
    pub fn schedule_mark(&mut self, symbol: Symbol, at_ms: i64, price: Decimal) {
        self.schedule.push((at_ms, symbol, price));
        self.schedule.sort_by_key(|(at, _, _)| *at);
    }

    /// Move the mark immediately and fill whatever now crosses.
    pub fn set_mark(&mut self, symbol: &Symbol, price: Decimal) {
        self.marks.insert(symbol.clone(), price);
        self.process_resting(symbol);
    }

    /// Advance sim time, applying scheduled mark updates in order and firing
    /// the cancellation token if its deadline passes.
    pub fn advance(&mut self, ms: u64) {
        let target = self.now_ms + ms as i64;
        while self.schedule.first().is_some_and(|(at, _, _)| *at <= target) {
            let (at, symbol, price) = self.schedule.remove(0);
            self.now_ms = at;
            self.set_mark(&symbol, price);
        }
        self.now_ms = target;

        if let Some((deadline, token)) = self.cancel_at.take() {
            if self.now_ms >= deadline {
                token.cancel();
            } else {
                self.cancel_at = Some((deadline, token));
            }
        }
    }

    /// Arrange for the cancellation token to fire at an absolute sim time.
    pub fn cancel_token_at(&mut self, at_ms: i64, token: CancelToken) {
        self.cancel_at = Some((at_ms, token));
    }

    /// Queue a fault for an upcoming `place_order` call.
    pub fn inject_fault(&mut self, fault: SimFault) {
        self.faults.push_back(fault);
    }

    /// Force a partial fill on a resting order (test hook).
    pub fn partial_fill(&mut self, client_id: OrderHandle, quantity: Decimal) {
        let Some(&id) = self.by_client.get(&client_id) else {
            return;
        };
        let symbol = self.orders[&id].symbol.clone();
        let mark = self.marks[&symbol];
        let order = self.orders.get_mut(&id).expect("order exists");
        order.executed += quantity;
        order.avg_price = Some(order.limit_price.unwrap_or(mark));
        order.status = if order.executed >= order.quantity {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };
    }

    pub fn now_ms(&self) -> i64 {
        self.now_ms
    }

    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    pub fn live_order_count(&self) -> usize {
        self.orders.values().filter(|o| o.status.is_live()).count()
    }

    pub fn status_of(&self, client_id: OrderHandle) -> Option<OrderStatus> {
        self.by_client
            .get(&client_id)
            .and_then(|id| self.orders.get(id))
            .map(|o| o.status)
    }

    fn fill(order: &mut SimOrder, price: Decimal) {
        order.executed = order.quantity;
        order.avg_price = Some(price);
        order.status = OrderStatus::Filled;
    }

    /// Walk resting orders for a symbol and fill whatever the current mark
    /// crosses. Stop-limits trigger first, then rest as plain limits.
    fn process_resting(&mut self, symbol: &Symbol) {
        let mark = self.marks[symbol];
        for order in self.orders.values_mut() {
            if &order.symbol != symbol || !order.status.is_live() {
                continue;
            }

            if order.order_type == OrderType::StopLimit && !order.triggered {
                let stop = Price::new_unchecked(order.stop_price.expect("stop order has stop"));
                if stop_condition_met(order.side, stop, Price::new_unchecked(mark)) {
                    order.triggered = true;
                } else {
                    continue;
                }
            }

            if let Some(limit) = order.limit_price {
                let crosses = match order.side {
                    Side::Buy => mark <= limit,
                    Side::Sell => mark >= limit,
                };
                if crosses {
                    Self::fill(order, limit);
                }
            }
        }
    }

    fn place(&mut self, request: &OrderRequest) -> Result<PlaceAck, GatewayError> {
        if !self.marks.contains_key(&request.symbol) {
            return Err(GatewayError::UnknownSymbol(request.symbol.clone()));
        }

        let mark = self.marks[&request.symbol];
        let exchange_id = self.next_id;
        self.next_id += 1;

        let mut order = SimOrder {
            exchange_id,
            client_id: request.client_id,
            symbol: request.symbol.clone(),
            side: request.side,
            order_type: request.order_type,
            quantity: request.quantity,
            limit_price: request.price.map(|p| p.value()),
            stop_price: request.stop_price.map(|p| p.value()),
            status: OrderStatus::New,
            executed: Decimal::ZERO,
            avg_price: None,
            triggered: false,
        };

        match request.order_type {
            OrderType::Market => Self::fill(&mut order, mark),
            OrderType::Limit => {
                let limit = order.limit_price.expect("limit order has price");
                let crosses = match order.side {
                    Side::Buy => mark <= limit,
                    Side::Sell => mark >= limit,
                };
                if crosses {
                    // taker fill at the better of mark and limit
                    Self::fill(&mut order, mark);
                }
            }
            OrderType::StopLimit => {
                let stop = Price::new_unchecked(order.stop_price.expect("stop order has stop"));
                if stop_condition_met(order.side, stop, Price::new_unchecked(mark)) {
                    order.triggered = true;
                }
            }
        }

        let ack = PlaceAck {
            exchange_order_id: ExchangeOrderId(exchange_id),
            status: order.status,
            executed_quantity: order.executed,
            average_price: order.avg_price.map(Price::new_unchecked),
        };
        self.by_client.insert(request.client_id, exchange_id);
        self.orders.insert(exchange_id, order);
        Ok(ack)
    }

    fn find(&self, lookup: &OrderLookup) -> Option<&SimOrder> {
        if let Some(id) = lookup.exchange_id {
            return self.orders.get(&id.0);
        }
        self.by_client
            .get(&lookup.client_id)
            .and_then(|id| self.orders.get(id))
    }
}

impl Default for SimWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared handle over the world; create one and `split()` it.
#[derive(Debug, Clone)]
pub struct SimControl {
    world: Rc<RefCell<SimWorld>>,
}

impl SimControl {
    pub fn new(world: SimWorld) -> Self {
        Self {
            world: Rc::new(RefCell::new(world)),
        }
    }

    /// Gateway and clock views for the executor. Both share this world.
    pub fn split(&self) -> (SimGateway, SimClock) {
        (
            SimGateway {
                world: self.world.clone(),
            },
            SimClock {
                world: self.world.clone(),
            },
        )
    }

    pub fn advance(&self, ms: u64) {
        self.world.borrow_mut().advance(ms);
    }

    pub fn set_mark(&self, symbol: &Symbol, price: Decimal) {
        self.world.borrow_mut().set_mark(symbol, price);
    }

    pub fn schedule_mark(&self, symbol: Symbol, at_ms: i64, price: Decimal) {
        self.world.borrow_mut().schedule_mark(symbol, at_ms, price);
    }

    pub fn inject_fault(&self, fault: SimFault) {
        self.world.borrow_mut().inject_fault(fault);
    }

    pub fn partial_fill(&self, client_id: OrderHandle, quantity: Decimal) {
        self.world.borrow_mut().partial_fill(client_id, quantity);
    }

    pub fn cancel_token_at(&self, at_ms: i64, token: CancelToken) {
        self.world.borrow_mut().cancel_token_at(at_ms, token);
    }

    pub fn now_ms(&self) -> i64 {
        self.world.borrow().now_ms()
    }

    pub fn order_count(&self) -> usize {
        self.world.borrow().order_count()
    }

    pub fn live_order_count(&self) -> usize {
        self.world.borrow().live_order_count()
    }

    pub fn status_of(&self, client_id: OrderHandle) -> Option<OrderStatus> {
        self.world.borrow().status_of(client_id)
    }
}

/// Gateway view over the shared sim world.
#[derive(Debug, Clone)]
pub struct SimGateway {
    world: Rc<RefCell<SimWorld>>,
}

impl ExchangeGateway for SimGateway {
    fn place_order(&mut self, request: &OrderRequest) -> Result<PlaceAck, GatewayError> {
        let mut world = self.world.borrow_mut();
        if let Some(fault) = world.faults.pop_front() {
            match fault {
                SimFault::Pass => {}
                SimFault::Transient(reason) => return Err(GatewayError::Transient(reason)),
                SimFault::Reject(reason) => return Err(GatewayError::Rejected(reason)),
                SimFault::Timeout { lands } => {
                    if lands {
                        world.place(request)?;
                    }
                    return Err(GatewayError::Timeout);
                }
            }
        }
        world.place(request)
    }

    fn cancel_order(
        &mut self,
        _symbol: &Symbol,
        exchange_id: ExchangeOrderId,
    ) -> Result<OrderStatus, GatewayError> {
        let mut world = self.world.borrow_mut();
        let order = world
            .orders
            .get_mut(&exchange_id.0)
            .ok_or(GatewayError::UnknownOrder)?;
        match order.status {
            OrderStatus::Filled => Err(GatewayError::Rejected("order already filled".into())),
            OrderStatus::Canceled => Ok(OrderStatus::Canceled),
            _ => {
                order.status = OrderStatus::Canceled;
                Ok(OrderStatus::Canceled)
            }
        }
    }

    fn order_status(
        &mut self,
        _symbol: &Symbol,
        lookup: &OrderLookup,
    ) -> Result<OrderSnapshot, GatewayError> {
        let world = self.world.borrow();
        world
            .find(lookup)
            .map(SimOrder::snapshot)
            .ok_or(GatewayError::UnknownOrder)
    }

    fn mark_price(&mut self, symbol: &Symbol) -> Result<Price, GatewayError> {
        let world = self.world.borrow();
        world
            .marks
            .get(symbol)
            .map(|m| Price::new_unchecked(*m))
            .ok_or_else(|| GatewayError::UnknownSymbol(symbol.clone()))
    }

    fn symbol_rules(&mut self, symbol: &Symbol) -> Result<SymbolRules, GatewayError> {
        let world = self.world.borrow();
        world
            .rules
            .get(symbol)
            .cloned()
            .ok_or_else(|| GatewayError::UnknownSymbol(symbol.clone()))
    }
}

/// Clock view over the shared sim world: sleeping advances simulated time.
#[derive(Debug, Clone)]
pub struct SimClock {
    world: Rc<RefCell<SimWorld>>,
}

impl Clock for SimClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_millis(self.world.borrow().now_ms())
    }

    fn sleep(&mut self, duration: Duration) {
        self.world.borrow_mut().advance(duration.as_millis() as u64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn btc() -> Symbol {
        Symbol::new("BTCUSDT")
    }

    fn world_at(mark: Decimal) -> SimControl {
        let mut world = SimWorld::new();
        world.list_symbol(btc(), SymbolRules::btc_usdt(), mark);
        SimControl::new(world)
    }

    fn request(
        client: u64,
        side: Side,
        order_type: OrderType,
        price: Option<Decimal>,
        stop: Option<Decimal>,
    ) -> OrderRequest {
        OrderRequest {
            client_id: OrderHandle(client),
            symbol: btc(),
            side,
            order_type,
            quantity: dec!(0.01),
            price: price.map(Price::new_unchecked),
            stop_price: stop.map(Price::new_unchecked),
            time_in_force: crate::order::TimeInForce::Gtc,
            reduce_only: false,
        }
    }

    #[test]
    fn market_order_fills_at_mark() {
        let control = world_at(dec!(50000));
        let (mut gw, _) = control.split();

        let ack = gw
            .place_order(&request(1, Side::Buy, OrderType::Market, None, None))
            .unwrap();
        assert_eq!(ack.status, OrderStatus::Filled);
        assert_eq!(ack.average_price.unwrap().value(), dec!(50000));
    }

    #[test]
    fn resting_limit_fills_when_price_crosses() {
        let control = world_at(dec!(50000));
        let (mut gw, _) = control.split();

        let ack = gw
            .place_order(&request(1, Side::Buy, OrderType::Limit, Some(dec!(49000)), None))
            .unwrap();
        assert_eq!(ack.status, OrderStatus::New);

        control.set_mark(&btc(), dec!(48900));
        assert_eq!(control.status_of(OrderHandle(1)), Some(OrderStatus::Filled));
    }

    #[test]
    fn scheduled_marks_apply_during_sleep() {
        let control = world_at(dec!(50000));
        let (mut gw, mut clock) = control.split();
        control.schedule_mark(btc(), 3_000, dec!(51500));

        gw.place_order(&request(1, Side::Sell, OrderType::Limit, Some(dec!(51000)), None))
            .unwrap();
        clock.sleep(Duration::from_secs(5));

        assert_eq!(control.status_of(OrderHandle(1)), Some(OrderStatus::Filled));
        assert_eq!(control.now_ms(), 5_000);
    }

    #[test]
    fn stop_limit_triggers_then_fills() {
        let control = world_at(dec!(50000));
        let (mut gw, _) = control.split();

        // sell stop at 49000, limit 48900
        let ack = gw
            .place_order(&request(
                1,
                Side::Sell,
                OrderType::StopLimit,
                Some(dec!(48900)),
                Some(dec!(49000)),
            ))
            .unwrap();
        assert_eq!(ack.status, OrderStatus::New);

        // falls through the stop and the limit
        control.set_mark(&btc(), dec!(48950));
        assert_eq!(control.status_of(OrderHandle(1)), Some(OrderStatus::Filled));
    }

    #[test]
    fn injected_timeout_can_land_the_order() {
        let control = world_at(dec!(50000));
        let (mut gw, _) = control.split();
        control.inject_fault(SimFault::Timeout { lands: true });

        let result = gw.place_order(&request(1, Side::Buy, OrderType::Limit, Some(dec!(49000)), None));
        assert!(matches!(result, Err(GatewayError::Timeout)));
        // the order landed despite the timeout
        assert_eq!(control.order_count(), 1);
        assert_eq!(control.status_of(OrderHandle(1)), Some(OrderStatus::New));
    }

    #[test]
    fn cancel_of_filled_order_is_rejected() {
        let control = world_at(dec!(50000));
        let (mut gw, _) = control.split();

        let ack = gw
            .place_order(&request(1, Side::Buy, OrderType::Market, None, None))
            .unwrap();
        let result = gw.cancel_order(&btc(), ack.exchange_order_id);
        assert!(matches!(result, Err(GatewayError::Rejected(_))));
    }
}
