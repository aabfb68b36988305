// 7.0 config.rs: strongly typed configuration records, one per strategy
// variant, plus the engine-wide settings. built fully-populated by the host
// (CLI, env, whatever) before anything executes; plan builders do the numeric
// validation once and components never see partial parameters.

use crate::retry::RetryPolicy;
use crate::types::{Price, Side, Symbol};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Engine-wide settings shared by every strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecConfig {
    /// Interval between status/price polls in the OCO, Grid, and stop-limit
    /// loops. Also bounds stop-trigger latency.
    pub poll_interval: Duration,
    /// Fraction of an OCO leg's quantity that must fill before a partial fill
    /// cancels the sibling leg. Zero means any partial fill counts.
    pub partial_fill_threshold: Decimal,
    /// Backoff policy for transient gateway failures.
    pub retry: RetryPolicy,
    /// Maximum number of events to retain in memory.
    pub max_events: usize,
    /// Echo each event to stdout as it is emitted.
    pub verbose: bool,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            partial_fill_threshold: Decimal::ZERO,
            retry: RetryPolicy::default(),
            max_events: 100_000,
            verbose: false,
        }
    }
}

/// Single-shot order parameters (market, limit, or exchange-held stop-limit).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderConfig {
    pub symbol: Symbol,
    pub side: Side,
    pub quantity: Decimal,
    /// Limit price. None means a market order.
    pub price: Option<Price>,
    /// Stop trigger price. Together with `price` this forms an exchange-held
    /// stop-limit; without a limit price it is ignored.
    pub stop_price: Option<Price>,
}

/// TWAP execution parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwapConfig {
    pub symbol: Symbol,
    pub side: Side,
    pub total_quantity: Decimal,
    /// Total execution window; slices are spaced `duration / slice_count`.
    pub duration: Duration,
    pub slice_count: u32,
    /// When set, slices go out as IOC limit orders at this price instead of
    /// market orders.
    pub limit_price_ceiling: Option<Price>,
}

/// Grid ladder parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridConfig {
    pub symbol: Symbol,
    pub lower_price: Price,
    pub upper_price: Price,
    /// Number of price levels, bounds inclusive. Must be at least 2.
    pub level_count: u32,
    pub quantity_per_level: Decimal,
}

/// OCO (one-cancels-the-other) exit parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcoConfig {
    pub symbol: Symbol,
    /// Side of both exit legs (SELL to close a long).
    pub side: Side,
    pub quantity: Decimal,
    pub take_profit_price: Price,
    /// Stop trigger for the protective leg.
    pub stop_price: Price,
    /// Limit price of the protective leg once triggered. None derives it from
    /// the stop price with a 0.1% offset on the adverse side.
    pub stop_limit_price: Option<Price>,
}

/// What to do when the stop condition already holds at arm time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImmediateTriggerPolicy {
    /// Fire immediately: submit the limit order before any wait.
    Submit,
    /// Refuse to arm; the caller almost certainly mistyped a price.
    Reject,
}

/// Client-side stop-limit parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopLimitConfig {
    pub symbol: Symbol,
    pub side: Side,
    pub quantity: Decimal,
    pub stop_price: Price,
    pub limit_price: Price,
    /// Give up waiting for the trigger after this long. None waits until the
    /// external cancellation signal.
    pub max_wait: Option<Duration>,
    pub on_immediate_trigger: ImmediateTriggerPolicy,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_poll_interval_is_five_seconds() {
        let config = ExecConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.partial_fill_threshold, Decimal::ZERO);
    }
}
