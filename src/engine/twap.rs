//! TWAP scheduler: split a parent order into equal time-spaced slices.
//!
//! Slice quantity is the total divided by the slice count, rounded down to
//! the lot step; the final slice absorbs the remainder so the slice sum
//! equals the requested total exactly. Each inter-slice wait is shortened by
//! the time already spent validating and submitting, and never goes negative.
//!
//! A slice that the exchange rejects, or that exhausts its transient retries,
//! fails the whole plan; its quantity is NOT redistributed over later slices.
//! The report shows exactly which slices filled and at what price.

use super::core::Executor;
use super::results::{ExecError, TwapReport};
use crate::clock::Clock;
use crate::config::TwapConfig;
use crate::events::EventPayload;
use crate::gateway::ExchangeGateway;
use crate::order::{OrderSpec, OrderStatus, TimeInForce};
use crate::plan::{PlanKind, PlanStatus, TwapPlan, TwapSlice};
use crate::types::Price;
use rust_decimal::Decimal;
use std::time::Duration;

/// Quantity-weighted mean of slice fill prices. None until something fills.
pub fn weighted_average_price(slices: &[TwapSlice]) -> Option<Price> {
    let mut quantity = Decimal::ZERO;
    let mut cost = Decimal::ZERO;
    for slice in slices {
        if let Some(price) = slice.executed_price {
            quantity += slice.executed_quantity;
            cost += slice.executed_quantity * price.value();
        }
    }
    if quantity > Decimal::ZERO {
        Price::new(cost / quantity)
    } else {
        None
    }
}

impl<G: ExchangeGateway, C: Clock> Executor<G, C> {
    pub fn run_twap(&mut self, cfg: &TwapConfig) -> Result<TwapReport, ExecError> {
        let rules = self.fetch_rules(&cfg.symbol)?;
        let plan_id = self.next_plan_id();
        let now = self.clock.now();
        let mut plan = TwapPlan::build(plan_id, cfg, &rules, now)?;

        self.emit(EventPayload::PlanCreated {
            plan_id,
            kind: PlanKind::Twap,
            symbol: plan.core.symbol.clone(),
            side: plan.core.side,
            total_quantity: plan.core.total_quantity,
        });
        plan.core.transition(PlanStatus::Running);

        let slice_count = plan.slice_count;
        for index in 0..slice_count as usize {
            if self.cancel.is_cancelled() {
                plan.core.transition(PlanStatus::Canceled);
                self.emit(EventPayload::PlanCanceled { plan_id });
                break;
            }

            let slice_started = self.clock.now();
            let quantity = plan.slices[index].quantity;
            let spec = match plan.limit_price_ceiling {
                // capped slice: IOC limit at the ceiling, never chase beyond it
                Some(ceiling) => OrderSpec::limit(
                    plan.core.symbol.clone(),
                    plan.core.side,
                    quantity,
                    ceiling,
                    TimeInForce::Ioc,
                ),
                None => OrderSpec::market(plan.core.symbol.clone(), plan.core.side, quantity),
            };

            match self.submit_tracked(plan_id, spec) {
                Ok(handle) => {
                    let view = self.order_view(handle);
                    let slice = &mut plan.slices[index];
                    slice.order = Some(handle);

                    if view.status == OrderStatus::Rejected {
                        let reason = view
                            .reject_reason
                            .unwrap_or_else(|| "order rejected".to_string());
                        slice.failure = Some(reason.clone());
                        self.emit(EventPayload::SliceFailed {
                            plan_id,
                            index: index as u32,
                            of: slice_count,
                            reason: reason.clone(),
                        });
                        plan.core.transition(PlanStatus::Failed);
                        self.emit(EventPayload::PlanFailed { plan_id, reason });
                        break;
                    }

                    slice.executed_quantity = view.executed_quantity;
                    slice.executed_price = view.average_price;
                    self.emit(EventPayload::SliceExecuted {
                        plan_id,
                        index: index as u32,
                        of: slice_count,
                        quantity,
                        price: view.average_price,
                    });
                }
                Err(ExecError::Cancelled) => {
                    plan.core.transition(PlanStatus::Canceled);
                    self.emit(EventPayload::PlanCanceled { plan_id });
                    break;
                }
                Err(e @ ExecError::GatewayExhausted { .. }) => {
                    let reason = e.to_string();
                    plan.slices[index].failure = Some(reason.clone());
                    self.emit(EventPayload::SliceFailed {
                        plan_id,
                        index: index as u32,
                        of: slice_count,
                        reason: reason.clone(),
                    });
                    plan.core.transition(PlanStatus::Failed);
                    self.emit(EventPayload::PlanFailed { plan_id, reason });
                    break;
                }
                Err(e) => return Err(e),
            }

            // wait out the rest of the interval, net of time already spent
            if index + 1 < slice_count as usize {
                let elapsed = self.clock.now().millis_since(slice_started);
                let interval_ms = plan.interval.as_millis() as u64;
                let wait = interval_ms.saturating_sub(elapsed);
                if wait > 0 {
                    self.clock.sleep(Duration::from_millis(wait));
                }
            }
        }

        if plan.core.status == PlanStatus::Running {
            plan.core.transition(PlanStatus::Completed);
            self.emit(EventPayload::PlanCompleted { plan_id });
        }

        let executed_quantity = plan.executed_quantity();
        let average_price = weighted_average_price(&plan.slices);
        Ok(TwapReport {
            plan,
            executed_quantity,
            average_price,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::OrderHandle;
    use rust_decimal_macros::dec;

    fn slice(qty: Decimal, executed: Decimal, price: Option<Decimal>) -> TwapSlice {
        TwapSlice {
            index: 0,
            quantity: qty,
            order: Some(OrderHandle(1)),
            executed_quantity: executed,
            executed_price: price.map(Price::new_unchecked),
            failure: None,
        }
    }

    #[test]
    fn weighted_average_weights_by_quantity() {
        let slices = vec![
            slice(dec!(0.75), dec!(0.75), Some(dec!(50000))),
            slice(dec!(0.25), dec!(0.25), Some(dec!(51000))),
        ];
        // (0.75*50000 + 0.25*51000) / 1.0 = 50250
        assert_eq!(
            weighted_average_price(&slices).unwrap().value(),
            dec!(50250)
        );
    }

    #[test]
    fn weighted_average_ignores_unfilled_slices() {
        let slices = vec![
            slice(dec!(0.5), dec!(0.5), Some(dec!(50000))),
            slice(dec!(0.5), dec!(0), None),
        ];
        assert_eq!(
            weighted_average_price(&slices).unwrap().value(),
            dec!(50000)
        );
    }

    #[test]
    fn weighted_average_is_none_without_fills() {
        let slices = vec![slice(dec!(0.5), dec!(0), None)];
        assert!(weighted_average_price(&slices).is_none());
    }
}
