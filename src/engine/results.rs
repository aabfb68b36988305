// 9.0.2: result types and errors for engine operations. every strategy run
// returns a typed report; partial completion is always reported, never
// silently discarded.

use super::oco::OcoLeg;
use crate::gateway::GatewayError;
use crate::order::OrderStatus;
use crate::plan::{GridPlan, OcoPlan, PlanError, StopLimitPlan, TwapPlan};
use crate::rules::RuleError;
use crate::types::{OrderHandle, PlanId, Price};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Outcome of a single-shot order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderReport {
    pub plan_id: PlanId,
    pub handle: OrderHandle,
    pub status: OrderStatus,
    pub executed_quantity: Decimal,
    pub average_price: Option<Price>,
}

/// Outcome of a TWAP run. The embedded plan records every slice: which order
/// it became, what filled at what price, and why a slice failed if one did.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwapReport {
    pub plan: TwapPlan,
    pub executed_quantity: Decimal,
    /// Quantity-weighted mean of the slice fill prices.
    pub average_price: Option<Price>,
}

/// Outcome of grid seeding/monitoring. Levels that could not be placed stay
/// in the plan without an order handle; the counters summarize activity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridReport {
    pub plan: GridPlan,
    pub seeded: u32,
    pub skipped: u32,
    pub fills: u32,
    pub respawns: u32,
}

/// Outcome of an OCO run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcoReport {
    pub plan: OcoPlan,
    pub filled_leg: Option<OcoLeg>,
    pub take_profit_status: OrderStatus,
    pub stop_status: OrderStatus,
}

/// Outcome of a client-side stop-limit run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopLimitReport {
    pub plan: StopLimitPlan,
    /// Status of the triggered limit order, when the trigger fired.
    pub order_status: Option<OrderStatus>,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ExecError {
    #[error(transparent)]
    Rules(#[from] RuleError),

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("gave up after {attempts} attempts: {last}")]
    GatewayExhausted { attempts: u32, last: GatewayError },

    #[error("order {handle:?} rejected: {reason}")]
    OrderRejected { handle: OrderHandle, reason: String },

    #[error("execution cancelled by external signal")]
    Cancelled,

    #[error("stop condition already satisfied at arm time (stop {stop}, mark {mark})")]
    StopAlreadySatisfied { stop: Price, mark: Price },
}
