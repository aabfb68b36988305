//! OCO monitor: two linked exit legs, at most one survives.
//!
//! Placement is atomic from the caller's perspective: if the stop leg cannot
//! be placed, the already-resting take-profit leg is cancelled before the
//! failure is reported - no dangling single-leg order. The poll loop then
//! refreshes both legs; when either fills (or partially fills beyond the
//! configured threshold), the sibling is cancelled. A sibling-cancel failure
//! means the race was lost and both legs are used up, which is an acceptable
//! terminal state, not an error.

use super::core::Executor;
use super::results::{ExecError, OcoReport};
use crate::clock::Clock;
use crate::config::OcoConfig;
use crate::events::{CancelReason, EventPayload};
use crate::gateway::ExchangeGateway;
use crate::order::{OrderSpec, OrderStatus};
use crate::plan::{OcoLinkState, OcoPlan, PlanKind, PlanStatus};
use crate::rules::SymbolRules;
use crate::types::{Price, Side};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OcoLeg {
    TakeProfit,
    Stop,
}

/// What the transition function sees of one leg.
#[derive(Debug, Clone, Copy)]
pub struct LegObservation {
    pub status: OrderStatus,
    pub executed_quantity: Decimal,
}

impl LegObservation {
    /// A leg is "used" once it filled, or partially filled beyond the
    /// threshold quantity.
    fn is_used(&self, threshold_quantity: Decimal) -> bool {
        match self.status {
            OrderStatus::Filled => true,
            OrderStatus::PartiallyFilled => self.executed_quantity > threshold_quantity,
            _ => false,
        }
    }
}

/// Pure per-iteration transition: given the current link state and the latest
/// leg observations, decide the next link state and which leg (if any) must
/// be cancelled. No I/O, no timers - directly testable.
pub fn oco_transition(
    link: OcoLinkState,
    take_profit: LegObservation,
    stop: LegObservation,
    threshold_quantity: Decimal,
) -> (OcoLinkState, Option<OcoLeg>) {
    if link != OcoLinkState::BothLive {
        return (link, None);
    }
    if take_profit.is_used(threshold_quantity) {
        return (OcoLinkState::OneFilled, Some(OcoLeg::Stop));
    }
    if stop.is_used(threshold_quantity) {
        return (OcoLinkState::OneFilled, Some(OcoLeg::TakeProfit));
    }
    (OcoLinkState::BothLive, None)
}

/// Stop leg limit price when the caller does not supply one: 0.1% beyond the
/// stop on the adverse side, the conventional protective offset.
fn default_stop_limit(side: Side, stop: Price, rules: &SymbolRules) -> Result<Price, ExecError> {
    let factor = match side {
        Side::Sell => Decimal::new(999, 3),  // 0.999
        Side::Buy => Decimal::new(1001, 3),  // 1.001
    };
    let raw = Price::new_unchecked(stop.value() * factor);
    Ok(rules.align_price(raw)?)
}

impl<G: ExchangeGateway, C: Clock> Executor<G, C> {
    pub fn run_oco(&mut self, cfg: &OcoConfig) -> Result<OcoReport, ExecError> {
        let rules = self.fetch_rules(&cfg.symbol)?;
        let validated = rules.validate(cfg.quantity, Some(cfg.take_profit_price))?;
        let take_profit_price = validated.price.expect("validated with a price");
        let stop_price = rules.align_price(cfg.stop_price)?;
        let stop_limit_price = match cfg.stop_limit_price {
            Some(p) => rules.align_price(p)?,
            None => default_stop_limit(cfg.side, stop_price, &rules)?,
        };

        let plan_id = self.next_plan_id();
        self.emit(EventPayload::PlanCreated {
            plan_id,
            kind: PlanKind::Oco,
            symbol: cfg.symbol.clone(),
            side: cfg.side,
            total_quantity: validated.quantity,
        });

        // leg 1: take-profit limit
        let tp_spec = OrderSpec::limit(
            cfg.symbol.clone(),
            cfg.side,
            validated.quantity,
            take_profit_price,
            crate::order::TimeInForce::Gtc,
        )
        .reduce_only();
        let take_profit = match self.submit_tracked(plan_id, tp_spec) {
            Ok(handle) => {
                let view = self.order_view(handle);
                if view.status == OrderStatus::Rejected {
                    let reason = view
                        .reject_reason
                        .unwrap_or_else(|| "order rejected".to_string());
                    self.emit(EventPayload::PlanFailed {
                        plan_id,
                        reason: reason.clone(),
                    });
                    return Err(ExecError::OrderRejected { handle, reason });
                }
                handle
            }
            Err(e) => {
                self.fail_plan_unless_cancelled(plan_id, &e);
                return Err(e);
            }
        };

        // leg 2: protective stop-limit; on failure the first leg must not
        // be left dangling
        let stop_spec = OrderSpec::stop_limit(
            cfg.symbol.clone(),
            cfg.side,
            validated.quantity,
            stop_price,
            stop_limit_price,
        )
        .reduce_only();
        let stop = match self.submit_tracked(plan_id, stop_spec) {
            Ok(handle) => {
                let view = self.order_view(handle);
                if view.status == OrderStatus::Rejected {
                    let reason = view
                        .reject_reason
                        .unwrap_or_else(|| "order rejected".to_string());
                    self.best_effort_cancel(plan_id, &[take_profit], CancelReason::PlanAborted);
                    self.emit(EventPayload::PlanFailed {
                        plan_id,
                        reason: reason.clone(),
                    });
                    return Err(ExecError::OrderRejected { handle, reason });
                }
                handle
            }
            Err(e) => {
                self.best_effort_cancel(plan_id, &[take_profit], CancelReason::PlanAborted);
                self.fail_plan_unless_cancelled(plan_id, &e);
                return Err(e);
            }
        };

        let now = self.clock.now();
        let mut plan = OcoPlan::new(
            plan_id,
            cfg.symbol.clone(),
            cfg.side,
            validated.quantity,
            take_profit,
            stop,
            now,
        );
        let threshold_quantity = validated.quantity * self.config.partial_fill_threshold;

        let filled_leg = loop {
            if self.cancel.is_cancelled() {
                self.best_effort_cancel(plan_id, &[take_profit, stop], CancelReason::Shutdown);
                plan.link_state = OcoLinkState::BothCanceled;
                plan.core.transition(PlanStatus::Canceled);
                self.emit(EventPayload::PlanCanceled { plan_id });
                break None;
            }

            // transient poll failures just mean a stale view this round
            let _ = self.refresh_view(take_profit);
            let _ = self.refresh_view(stop);
            let tp_view = self.order_view(take_profit);
            let stop_view = self.order_view(stop);

            let (next, to_cancel) = oco_transition(
                plan.link_state,
                LegObservation {
                    status: tp_view.status,
                    executed_quantity: tp_view.executed_quantity,
                },
                LegObservation {
                    status: stop_view.status,
                    executed_quantity: stop_view.executed_quantity,
                },
                threshold_quantity,
            );

            if let Some(leg) = to_cancel {
                let (used, sibling) = match leg {
                    OcoLeg::Stop => (take_profit, stop),
                    OcoLeg::TakeProfit => (stop, take_profit),
                };
                let used_view = self.order_view(used);
                self.emit(EventPayload::OrderFilled {
                    plan_id,
                    handle: used,
                    executed_quantity: used_view.executed_quantity,
                    average_price: used_view.average_price,
                });

                let now = self.clock.now();
                // a failed cancel here means the sibling also just filled;
                // both legs used up is an acceptable terminal state
                if self.tracker.cancel(&mut self.gateway, sibling, now).is_ok() {
                    self.emit(EventPayload::OrderCanceled {
                        plan_id,
                        handle: sibling,
                        reason: CancelReason::SiblingFilled,
                    });
                }

                plan.link_state = next;
                plan.core.transition(PlanStatus::Completed);
                self.emit(EventPayload::PlanCompleted { plan_id });
                break Some(match leg {
                    OcoLeg::Stop => OcoLeg::TakeProfit,
                    OcoLeg::TakeProfit => OcoLeg::Stop,
                });
            }

            // both legs gone terminal without a qualifying fill: nothing left
            // to monitor
            if tp_view.status.is_terminal() && stop_view.status.is_terminal() {
                plan.link_state = OcoLinkState::BothCanceled;
                plan.core.transition(PlanStatus::Canceled);
                self.emit(EventPayload::PlanCanceled { plan_id });
                break None;
            }

            self.clock.sleep(self.config.poll_interval);
        };

        let take_profit_status = self.order_view(take_profit).status;
        let stop_status = self.order_view(stop).status;
        Ok(OcoReport {
            plan,
            filled_leg,
            take_profit_status,
            stop_status,
        })
    }

    fn fail_plan_unless_cancelled(&mut self, plan_id: crate::types::PlanId, error: &ExecError) {
        match error {
            ExecError::Cancelled => self.emit(EventPayload::PlanCanceled { plan_id }),
            e => {
                let reason = e.to_string();
                self.emit(EventPayload::PlanFailed { plan_id, reason });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn leg(status: OrderStatus, executed: Decimal) -> LegObservation {
        LegObservation {
            status,
            executed_quantity: executed,
        }
    }

    #[test]
    fn filled_take_profit_cancels_stop() {
        let (next, to_cancel) = oco_transition(
            OcoLinkState::BothLive,
            leg(OrderStatus::Filled, dec!(1)),
            leg(OrderStatus::New, dec!(0)),
            dec!(0),
        );
        assert_eq!(next, OcoLinkState::OneFilled);
        assert_eq!(to_cancel, Some(OcoLeg::Stop));
    }

    #[test]
    fn filled_stop_cancels_take_profit() {
        let (next, to_cancel) = oco_transition(
            OcoLinkState::BothLive,
            leg(OrderStatus::New, dec!(0)),
            leg(OrderStatus::Filled, dec!(1)),
            dec!(0),
        );
        assert_eq!(next, OcoLinkState::OneFilled);
        assert_eq!(to_cancel, Some(OcoLeg::TakeProfit));
    }

    #[test]
    fn partial_fill_below_threshold_keeps_both_live() {
        let (next, to_cancel) = oco_transition(
            OcoLinkState::BothLive,
            leg(OrderStatus::PartiallyFilled, dec!(0.1)),
            leg(OrderStatus::New, dec!(0)),
            dec!(0.5),
        );
        assert_eq!(next, OcoLinkState::BothLive);
        assert_eq!(to_cancel, None);
    }

    #[test]
    fn partial_fill_beyond_threshold_counts_as_used() {
        let (next, to_cancel) = oco_transition(
            OcoLinkState::BothLive,
            leg(OrderStatus::PartiallyFilled, dec!(0.6)),
            leg(OrderStatus::New, dec!(0)),
            dec!(0.5),
        );
        assert_eq!(next, OcoLinkState::OneFilled);
        assert_eq!(to_cancel, Some(OcoLeg::Stop));
    }

    #[test]
    fn settled_link_state_never_acts_again() {
        let (next, to_cancel) = oco_transition(
            OcoLinkState::OneFilled,
            leg(OrderStatus::Filled, dec!(1)),
            leg(OrderStatus::Filled, dec!(1)),
            dec!(0),
        );
        assert_eq!(next, OcoLinkState::OneFilled);
        assert_eq!(to_cancel, None);
    }

    #[test]
    fn default_stop_limit_offsets_adversely() {
        let rules = SymbolRules::btc_usdt();
        let stop = Price::new_unchecked(dec!(49000));

        let sell = default_stop_limit(Side::Sell, stop, &rules).unwrap();
        assert_eq!(sell.value(), dec!(48951)); // 49000 * 0.999

        let buy = default_stop_limit(Side::Buy, stop, &rules).unwrap();
        assert_eq!(buy.value(), dec!(49049)); // 49000 * 1.001
    }
}
