//! Grid manager: seed a ladder of resting limit orders across a price range,
//! then keep it alive as levels fill.
//!
//! Levels are independent - one failed placement is logged and skipped, and
//! the partial grid is a valid, reported outcome. In monitoring mode a filled
//! BUY respawns a SELL one level up (and a filled SELL a BUY one level down),
//! so the ladder re-seeds itself as the price oscillates. Respawn targets
//! outside the ladder or already holding a live order are left alone.

use super::core::Executor;
use super::results::{ExecError, GridReport};
use crate::clock::Clock;
use crate::config::GridConfig;
use crate::events::{CancelReason, EventPayload};
use crate::gateway::ExchangeGateway;
use crate::order::{OrderSpec, OrderStatus, TimeInForce};
use crate::plan::{GridPlan, PlanKind, PlanStatus};
use crate::types::{OrderHandle, Side};

/// Where a fill at `index` respawns, and on which side. Pure.
pub fn respawn_target(index: usize, side: Side, level_count: usize) -> Option<(usize, Side)> {
    match side {
        Side::Buy => {
            let target = index + 1;
            (target < level_count).then_some((target, Side::Sell))
        }
        Side::Sell => index.checked_sub(1).map(|target| (target, Side::Buy)),
    }
}

/// Activity observed in one monitoring pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct GridMonitorStats {
    pub fills: u32,
    pub respawns: u32,
}

impl<G: ExchangeGateway, C: Clock> Executor<G, C> {
    /// Build and seed the ladder. Returns once every level has been attempted;
    /// the plan stays `Running` with its orders resting.
    pub fn run_grid(&mut self, cfg: &GridConfig) -> Result<GridReport, ExecError> {
        let rules = self.fetch_rules(&cfg.symbol)?;
        let seed_price = self.fetch_mark(&cfg.symbol)?;
        let plan_id = self.next_plan_id();
        let now = self.clock.now();
        let mut plan = GridPlan::build(plan_id, cfg, &rules, seed_price, now)?;

        self.emit(EventPayload::PlanCreated {
            plan_id,
            kind: PlanKind::Grid,
            symbol: plan.core.symbol.clone(),
            side: plan.core.side,
            total_quantity: plan.core.total_quantity,
        });

        let mut seeded = 0u32;
        let mut skipped = 0u32;

        for index in 0..plan.levels.len() {
            if self.cancel.is_cancelled() {
                self.abandon_grid(&mut plan);
                return Ok(GridReport {
                    plan,
                    seeded,
                    skipped,
                    fills: 0,
                    respawns: 0,
                });
            }

            let price = plan.levels[index].price;
            let Some(side) = plan.levels[index].side else {
                skipped += 1;
                self.emit(EventPayload::LevelSkipped {
                    plan_id,
                    index: index as u32,
                    price,
                    reason: "level at seed price".to_string(),
                });
                continue;
            };

            let spec = OrderSpec::limit(
                plan.core.symbol.clone(),
                side,
                plan.quantity_per_level,
                price,
                TimeInForce::Gtc,
            );
            match self.submit_tracked(plan_id, spec) {
                Ok(handle) => {
                    let view = self.order_view(handle);
                    if view.status == OrderStatus::Rejected {
                        skipped += 1;
                        self.emit(EventPayload::LevelSkipped {
                            plan_id,
                            index: index as u32,
                            price,
                            reason: view
                                .reject_reason
                                .unwrap_or_else(|| "order rejected".to_string()),
                        });
                    } else {
                        seeded += 1;
                        plan.levels[index].order = Some(handle);
                        self.emit(EventPayload::LevelSeeded {
                            plan_id,
                            index: index as u32,
                            side,
                            price,
                        });
                    }
                }
                Err(ExecError::Cancelled) => {
                    self.abandon_grid(&mut plan);
                    return Ok(GridReport {
                        plan,
                        seeded,
                        skipped,
                        fills: 0,
                        respawns: 0,
                    });
                }
                Err(e @ ExecError::GatewayExhausted { .. }) => {
                    // this level is lost, the rest of the ladder still goes out
                    skipped += 1;
                    self.emit(EventPayload::LevelSkipped {
                        plan_id,
                        index: index as u32,
                        price,
                        reason: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        if seeded == 0 {
            plan.core.transition(PlanStatus::Failed);
            self.emit(EventPayload::PlanFailed {
                plan_id,
                reason: "no grid level could be placed".to_string(),
            });
        } else {
            plan.core.transition(PlanStatus::Running);
        }

        Ok(GridReport {
            plan,
            seeded,
            skipped,
            fills: 0,
            respawns: 0,
        })
    }

    /// One monitoring pass, two phases: first observe every level and clear
    /// the ones that filled, then respawn into the now-settled ladder. The
    /// split matters - two adjacent fills in the same pass must both see each
    /// other's level as vacated before respawns are aimed.
    pub fn grid_poll_once(&mut self, plan: &mut GridPlan) -> Result<GridMonitorStats, ExecError> {
        let plan_id = plan.core.id;
        let mut stats = GridMonitorStats::default();
        let mut filled: Vec<(usize, Side)> = Vec::new();

        for index in 0..plan.levels.len() {
            let Some(handle) = plan.levels[index].order else {
                continue;
            };
            let view = match self.refresh_view(handle) {
                Ok(view) => view,
                // transient poll failure: try again next round
                Err(_) => continue,
            };

            match view.status {
                OrderStatus::Filled => {
                    stats.fills += 1;
                    let side = plan.levels[index].side.expect("seeded level has a side");
                    plan.levels[index].order = None;
                    filled.push((index, side));
                    self.emit(EventPayload::OrderFilled {
                        plan_id,
                        handle,
                        executed_quantity: view.executed_quantity,
                        average_price: view.average_price,
                    });
                }
                OrderStatus::Canceled | OrderStatus::Rejected | OrderStatus::Expired => {
                    // externally removed; leave the level unseeded
                    plan.levels[index].order = None;
                }
                _ => {}
            }
        }

        for (index, side) in filled {
            if let Some((target, new_side)) = respawn_target(index, side, plan.levels.len()) {
                if plan.levels[target].order.is_none() {
                    stats.respawns += self.respawn_level(plan, target, new_side)? as u32;
                }
            }
        }

        Ok(stats)
    }

    /// Poll the ladder at the configured interval until the external
    /// cancellation signal arrives, then cancel whatever still rests.
    pub fn monitor_grid(&mut self, plan: &mut GridPlan) -> Result<GridMonitorStats, ExecError> {
        let plan_id = plan.core.id;
        let mut total = GridMonitorStats::default();

        loop {
            if self.cancel.is_cancelled() {
                self.abandon_grid(plan);
                return Ok(total);
            }

            match self.grid_poll_once(plan) {
                Ok(stats) => {
                    total.fills += stats.fills;
                    total.respawns += stats.respawns;
                }
                Err(ExecError::Cancelled) => continue,
                Err(e) => {
                    self.emit(EventPayload::PlanFailed {
                        plan_id,
                        reason: e.to_string(),
                    });
                    plan.core.transition(PlanStatus::Failed);
                    return Err(e);
                }
            }

            self.clock.sleep(self.config.poll_interval);
        }
    }

    fn respawn_level(
        &mut self,
        plan: &mut GridPlan,
        target: usize,
        side: Side,
    ) -> Result<bool, ExecError> {
        let plan_id = plan.core.id;
        let price = plan.levels[target].price;
        let spec = OrderSpec::limit(
            plan.core.symbol.clone(),
            side,
            plan.quantity_per_level,
            price,
            TimeInForce::Gtc,
        );

        match self.submit_tracked(plan_id, spec) {
            Ok(handle) => {
                let view = self.order_view(handle);
                if view.status == OrderStatus::Rejected {
                    self.emit(EventPayload::LevelSkipped {
                        plan_id,
                        index: target as u32,
                        price,
                        reason: view
                            .reject_reason
                            .unwrap_or_else(|| "order rejected".to_string()),
                    });
                    Ok(false)
                } else {
                    plan.levels[target].order = Some(handle);
                    plan.levels[target].side = Some(side);
                    self.emit(EventPayload::LevelRespawned {
                        plan_id,
                        index: target as u32,
                        side,
                        price,
                    });
                    Ok(true)
                }
            }
            Err(e @ ExecError::Cancelled) => Err(e),
            Err(e) => {
                self.emit(EventPayload::LevelSkipped {
                    plan_id,
                    index: target as u32,
                    price,
                    reason: e.to_string(),
                });
                Ok(false)
            }
        }
    }

    /// Best-effort teardown on the way out: cancel resting levels, mark the
    /// plan cancelled.
    fn abandon_grid(&mut self, plan: &mut GridPlan) {
        let plan_id = plan.core.id;
        let handles: Vec<OrderHandle> = plan.levels.iter().filter_map(|l| l.order).collect();
        self.best_effort_cancel(plan_id, &handles, CancelReason::Shutdown);
        for level in &mut plan.levels {
            if let Some(handle) = level.order {
                let terminal = self
                    .tracker
                    .get(handle)
                    .map(|o| o.is_terminal())
                    .unwrap_or(true);
                if terminal {
                    level.order = None;
                }
            }
        }
        plan.core.transition(PlanStatus::Canceled);
        self.emit(EventPayload::PlanCanceled { plan_id });
    }
}
