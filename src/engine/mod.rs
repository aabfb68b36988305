// 9.0: the executor. drives strategy plans to completion against the exchange
// gateway: single-shot orders, TWAP slicing, grid seeding/monitoring, OCO
// linking, and client-side stop-limit triggering. one shared submission path
// handles retry, backoff, and timeout reconciliation for all of them.

mod core;
mod grid;
mod oco;
mod results;
mod single;
mod stop_limit;
mod twap;

pub use core::Executor;
pub use grid::{respawn_target, GridMonitorStats};
pub use oco::{oco_transition, LegObservation, OcoLeg};
pub use results::{
    ExecError, GridReport, OcoReport, OrderReport, StopLimitReport, TwapReport,
};
pub use stop_limit::stop_condition_met;
pub use twap::weighted_average_price;
