// 9.1 engine/core.rs: the executor. one per invocation; owns the gateway
// handle, the clock, the order tracker, and the event log. strategy drivers
// live in the sibling files and share the context through these fields -
// there is no global state anywhere in the engine.

use super::results::ExecError;
use crate::clock::{CancelToken, Clock};
use crate::config::ExecConfig;
use crate::events::{CancelReason, Event, EventLog, EventPayload};
use crate::gateway::{ExchangeGateway, GatewayError};
use crate::order::{Order, OrderSpec, OrderStatus};
use crate::rules::SymbolRules;
use crate::tracker::{OrderTracker, Reconciliation};
use crate::types::{OrderHandle, PlanId, Price, Symbol};
use rust_decimal::Decimal;

/// Copy of the order fields strategy code needs, detached from the tracker's
/// borrow so drivers can emit events while holding one.
#[derive(Debug, Clone)]
pub(super) struct OrderView {
    pub handle: OrderHandle,
    pub status: OrderStatus,
    pub executed_quantity: Decimal,
    pub average_price: Option<Price>,
    pub reject_reason: Option<String>,
}

impl OrderView {
    fn of(order: &Order) -> Self {
        Self {
            handle: order.handle,
            status: order.status,
            executed_quantity: order.executed_quantity,
            average_price: order.average_fill_price,
            reject_reason: order.reject_reason.clone(),
        }
    }
}

pub struct Executor<G, C> {
    pub(super) gateway: G,
    pub(super) clock: C,
    pub(super) config: ExecConfig,
    pub(super) tracker: OrderTracker,
    pub(super) events: EventLog,
    pub(super) cancel: CancelToken,
    next_plan_id: u64,
}

impl<G: ExchangeGateway, C: Clock> Executor<G, C> {
    pub fn new(gateway: G, clock: C, config: ExecConfig) -> Self {
        let events = EventLog::new(config.max_events, config.verbose);
        Self {
            gateway,
            clock,
            config,
            tracker: OrderTracker::new(),
            events,
            cancel: CancelToken::new(),
            next_plan_id: 1,
        }
    }

    /// Handle the host can use to request cancellation (e.g. from a signal
    /// handler). Checked at the top of every engine loop.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn events(&self) -> &[Event] {
        self.events.events()
    }

    pub fn tracker(&self) -> &OrderTracker {
        &self.tracker
    }

    pub fn order(&self, handle: OrderHandle) -> Option<&Order> {
        self.tracker.get(handle)
    }

    pub(super) fn next_plan_id(&mut self) -> PlanId {
        let id = PlanId(self.next_plan_id);
        self.next_plan_id += 1;
        id
    }

    pub(super) fn emit(&mut self, payload: EventPayload) {
        let now = self.clock.now();
        self.events.emit(now, payload);
    }

    pub(super) fn ensure_not_cancelled(&self) -> Result<(), ExecError> {
        if self.cancel.is_cancelled() {
            Err(ExecError::Cancelled)
        } else {
            Ok(())
        }
    }

    pub(super) fn fetch_rules(&mut self, symbol: &Symbol) -> Result<SymbolRules, ExecError> {
        Ok(self.gateway.symbol_rules(symbol)?)
    }

    pub(super) fn fetch_mark(&mut self, symbol: &Symbol) -> Result<Price, ExecError> {
        Ok(self.gateway.mark_price(symbol)?)
    }

    pub(super) fn order_view(&self, handle: OrderHandle) -> OrderView {
        OrderView::of(self.tracker.get(handle).expect("order handle not in tracker"))
    }

    /// Refresh an order and return a detached view. Transient refresh
    /// failures surface as errors for the caller to skip or escalate.
    pub(super) fn refresh_view(&mut self, handle: OrderHandle) -> Result<OrderView, GatewayError> {
        let now = self.clock.now();
        let order = self.tracker.refresh(&mut self.gateway, handle, now)?;
        Ok(OrderView::of(order))
    }

    /// The one submission path every strategy uses: create a tracked order,
    /// place it, retry transient failures with bounded exponential backoff,
    /// and reconcile ambiguous timeouts through a client-id lookup before
    /// ever re-submitting (a timed-out place may have landed).
    ///
    /// An explicit exchange rejection is NOT an `Err`: the returned order
    /// carries status `Rejected` and the reason, and the caller decides
    /// whether that kills the plan.
    pub(super) fn submit_tracked(
        &mut self,
        plan_id: PlanId,
        spec: OrderSpec,
    ) -> Result<OrderHandle, ExecError> {
        let now = self.clock.now();
        let handle = self.tracker.create(spec, now);
        let mut attempt: u32 = 1;

        loop {
            self.ensure_not_cancelled()?;
            let now = self.clock.now();

            let failure = match self.tracker.place(&mut self.gateway, handle, now) {
                Ok(_) => {
                    self.emit_placement_outcome(plan_id, handle);
                    return Ok(handle);
                }
                Err(GatewayError::Timeout) => {
                    let now = self.clock.now();
                    match self.tracker.reconcile(&mut self.gateway, handle, now) {
                        Ok(Reconciliation::Found) => {
                            self.emit_placement_outcome(plan_id, handle);
                            return Ok(handle);
                        }
                        Ok(Reconciliation::NotFound) => GatewayError::Timeout,
                        Err(e) => e,
                    }
                }
                Err(e @ GatewayError::Transient(_)) => e,
                Err(e) => return Err(ExecError::Gateway(e)),
            };

            if attempt >= self.config.retry.max_attempts {
                return Err(ExecError::GatewayExhausted {
                    attempts: attempt,
                    last: failure,
                });
            }

            let delay = self.config.retry.delay_for(attempt);
            self.emit(EventPayload::RetryAttempted {
                plan_id,
                handle,
                attempt,
                delay_ms: delay.as_millis() as u64,
                reason: failure.to_string(),
            });
            self.clock.sleep(delay);
            attempt += 1;
        }
    }

    fn emit_placement_outcome(&mut self, plan_id: PlanId, handle: OrderHandle) {
        let view = self.order_view(handle);
        let order = self.tracker.get(handle).expect("order handle not in tracker");
        let (symbol, side, order_type, quantity, price, exchange_id) = (
            order.symbol.clone(),
            order.side,
            order.order_type,
            order.quantity,
            order.price,
            order.exchange_id,
        );

        if view.status == OrderStatus::Rejected {
            self.emit(EventPayload::OrderRejected {
                plan_id,
                handle,
                reason: view
                    .reject_reason
                    .unwrap_or_else(|| "unspecified".to_string()),
            });
            return;
        }

        self.emit(EventPayload::OrderSubmitted {
            plan_id,
            handle,
            exchange_id,
            symbol,
            side,
            order_type,
            quantity,
            price,
        });

        if view.status == OrderStatus::Filled {
            self.emit(EventPayload::OrderFilled {
                plan_id,
                handle,
                executed_quantity: view.executed_quantity,
                average_price: view.average_price,
            });
        }
    }

    /// Cancel whatever is still resting, ignoring failures. Used on the way
    /// out of a plan (external cancellation or abort) where the engine must
    /// not leave orders behind but can no longer escalate errors.
    pub(super) fn best_effort_cancel(
        &mut self,
        plan_id: PlanId,
        handles: &[OrderHandle],
        reason: CancelReason,
    ) {
        for &handle in handles {
            let live = self
                .tracker
                .get(handle)
                .map(|o| !o.is_terminal())
                .unwrap_or(false);
            if !live {
                continue;
            }
            let now = self.clock.now();
            if self.tracker.cancel(&mut self.gateway, handle, now).is_ok() {
                self.emit(EventPayload::OrderCanceled {
                    plan_id,
                    handle,
                    reason,
                });
            }
        }
    }
}
