//! Client-side stop-limit trigger evaluator.
//!
//! The plan sits `Armed` while the engine samples the mark price; when the
//! price crosses the stop, a plain limit order goes out at the limit price.
//! Sampling is periodic (`ExecConfig.poll_interval`), not a push feed, so
//! trigger latency is bounded by the poll interval - size the interval to the
//! instrument's volatility.
//!
//! If the stop condition already holds when the plan is armed, the configured
//! `ImmediateTriggerPolicy` decides: `Submit` fires before any wait,
//! `Reject` refuses to arm (the caller almost certainly mistyped a price).

use super::core::Executor;
use super::results::{ExecError, StopLimitReport};
use crate::clock::Clock;
use crate::config::{ImmediateTriggerPolicy, StopLimitConfig};
use crate::events::EventPayload;
use crate::gateway::ExchangeGateway;
use crate::order::{OrderSpec, OrderStatus, TimeInForce};
use crate::plan::{PlanKind, PlanStatus, StopLimitPlan, TriggerState};
use crate::types::{Price, Side};

/// Trigger predicate: a SELL stop fires when the mark trades at or below the
/// stop price, a BUY stop at or above. Shared with the simulated exchange's
/// stop handling.
pub fn stop_condition_met(side: Side, stop_price: Price, mark: Price) -> bool {
    match side {
        Side::Sell => mark <= stop_price,
        Side::Buy => mark >= stop_price,
    }
}

impl<G: ExchangeGateway, C: Clock> Executor<G, C> {
    pub fn run_stop_limit(&mut self, cfg: &StopLimitConfig) -> Result<StopLimitReport, ExecError> {
        let rules = self.fetch_rules(&cfg.symbol)?;
        let validated = rules.validate(cfg.quantity, Some(cfg.limit_price))?;
        let limit_price = validated.price.expect("validated with a price");
        let stop_price = rules.align_price(cfg.stop_price)?;

        let plan_id = self.next_plan_id();
        let now = self.clock.now();
        let mut plan = StopLimitPlan::new(
            plan_id,
            cfg.symbol.clone(),
            cfg.side,
            validated.quantity,
            stop_price,
            limit_price,
            now,
        );
        self.emit(EventPayload::PlanCreated {
            plan_id,
            kind: PlanKind::StopLimit,
            symbol: cfg.symbol.clone(),
            side: cfg.side,
            total_quantity: validated.quantity,
        });
        plan.core.transition(PlanStatus::Running);

        let armed_at = self.clock.now();
        let mut arming_sample = true;

        loop {
            if self.cancel.is_cancelled() {
                plan.trigger_state = TriggerState::Expired;
                plan.core.transition(PlanStatus::Canceled);
                self.emit(EventPayload::PlanCanceled { plan_id });
                return Ok(StopLimitReport {
                    plan,
                    order_status: None,
                });
            }

            // a failed price sample is just a missed poll, not a plan failure
            if let Ok(mark) = self.gateway.mark_price(&cfg.symbol) {
                if stop_condition_met(cfg.side, stop_price, mark) {
                    if arming_sample && cfg.on_immediate_trigger == ImmediateTriggerPolicy::Reject
                    {
                        self.emit(EventPayload::PlanFailed {
                            plan_id,
                            reason: format!(
                                "stop {} already satisfied by mark {} at arm time",
                                stop_price, mark
                            ),
                        });
                        return Err(ExecError::StopAlreadySatisfied {
                            stop: stop_price,
                            mark,
                        });
                    }
                    plan.trigger_state = TriggerState::Triggered;
                    self.emit(EventPayload::StopTriggered {
                        plan_id,
                        mark_price: mark,
                        stop_price,
                    });
                    return self.submit_triggered_limit(plan, cfg);
                }
            }
            arming_sample = false;

            if let Some(budget) = cfg.max_wait {
                let waited_ms = self.clock.now().millis_since(armed_at);
                if waited_ms >= budget.as_millis() as u64 {
                    plan.trigger_state = TriggerState::Expired;
                    plan.core.transition(PlanStatus::Canceled);
                    self.emit(EventPayload::StopExpired { plan_id, waited_ms });
                    self.emit(EventPayload::PlanCanceled { plan_id });
                    return Ok(StopLimitReport {
                        plan,
                        order_status: None,
                    });
                }
            }

            let interval = self.config.poll_interval;
            self.clock.sleep(interval);
        }
    }

    fn submit_triggered_limit(
        &mut self,
        mut plan: StopLimitPlan,
        cfg: &StopLimitConfig,
    ) -> Result<StopLimitReport, ExecError> {
        let plan_id = plan.core.id;
        let spec = OrderSpec::limit(
            cfg.symbol.clone(),
            cfg.side,
            plan.core.total_quantity,
            plan.limit_price,
            TimeInForce::Gtc,
        );

        match self.submit_tracked(plan_id, spec) {
            Ok(handle) => {
                plan.order = Some(handle);
                let view = self.order_view(handle);
                if view.status == OrderStatus::Rejected {
                    plan.core.transition(PlanStatus::Failed);
                    self.emit(EventPayload::PlanFailed {
                        plan_id,
                        reason: view
                            .reject_reason
                            .unwrap_or_else(|| "order rejected".to_string()),
                    });
                } else {
                    plan.core.transition(PlanStatus::Completed);
                    self.emit(EventPayload::PlanCompleted { plan_id });
                }
                let status = view.status;
                Ok(StopLimitReport {
                    plan,
                    order_status: Some(status),
                })
            }
            Err(ExecError::Cancelled) => {
                plan.core.transition(PlanStatus::Canceled);
                self.emit(EventPayload::PlanCanceled { plan_id });
                Ok(StopLimitReport {
                    plan,
                    order_status: None,
                })
            }
            Err(e @ ExecError::GatewayExhausted { .. }) => {
                plan.core.transition(PlanStatus::Failed);
                self.emit(EventPayload::PlanFailed {
                    plan_id,
                    reason: e.to_string(),
                });
                Ok(StopLimitReport {
                    plan,
                    order_status: None,
                })
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn price(v: rust_decimal::Decimal) -> Price {
        Price::new_unchecked(v)
    }

    #[test]
    fn sell_stop_fires_at_or_below() {
        let stop = price(dec!(49000));
        assert!(stop_condition_met(Side::Sell, stop, price(dec!(49000))));
        assert!(stop_condition_met(Side::Sell, stop, price(dec!(48000))));
        assert!(!stop_condition_met(Side::Sell, stop, price(dec!(50000))));
    }

    #[test]
    fn buy_stop_fires_at_or_above() {
        let stop = price(dec!(51000));
        assert!(stop_condition_met(Side::Buy, stop, price(dec!(51000))));
        assert!(stop_condition_met(Side::Buy, stop, price(dec!(52000))));
        assert!(!stop_condition_met(Side::Buy, stop, price(dec!(50000))));
    }
}
