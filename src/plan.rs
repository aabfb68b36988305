// 8.0 plan.rs: strategy plans. a plan is the deterministic decomposition of a
// trading intent into exchange operations, built once from validated config
// and then driven by the engine. plans are in-memory only and die with the
// process.

use crate::config::{GridConfig, TwapConfig};
use crate::rules::{align_down, RuleError, SymbolRules};
use crate::types::{OrderHandle, PlanId, Price, Side, Symbol, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Which strategy a plan (or event) belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanKind {
    /// Single-shot order, no multi-step structure.
    Order,
    Twap,
    Grid,
    Oco,
    StopLimit,
}

/// Plan lifecycle. Transitions are monotonic: once terminal, a plan never
/// changes status again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanStatus {
    Initializing,
    Running,
    Completed,
    Canceled,
    Failed,
}

impl PlanStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PlanStatus::Completed | PlanStatus::Canceled | PlanStatus::Failed
        )
    }

    fn rank(&self) -> u8 {
        match self {
            PlanStatus::Initializing => 0,
            PlanStatus::Running => 1,
            PlanStatus::Completed | PlanStatus::Canceled | PlanStatus::Failed => 2,
        }
    }
}

/// Fields shared by every plan variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanCore {
    pub id: PlanId,
    pub symbol: Symbol,
    pub side: Side,
    pub total_quantity: Decimal,
    pub created_at: Timestamp,
    pub status: PlanStatus,
}

impl PlanCore {
    pub fn new(
        id: PlanId,
        symbol: Symbol,
        side: Side,
        total_quantity: Decimal,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id,
            symbol,
            side,
            total_quantity,
            created_at,
            status: PlanStatus::Initializing,
        }
    }

    /// Monotonic status transition; regressions and post-terminal changes are
    /// ignored.
    pub fn transition(&mut self, status: PlanStatus) {
        if self.status.is_terminal() {
            return;
        }
        if status.rank() >= self.status.rank() {
            self.status = status;
        }
    }
}

// 8.1: TWAP - equal time-spaced slices, remainder absorbed into the last one.

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwapSlice {
    pub index: u32,
    pub quantity: Decimal,
    pub order: Option<OrderHandle>,
    pub executed_quantity: Decimal,
    pub executed_price: Option<Price>,
    pub failure: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwapPlan {
    pub core: PlanCore,
    pub slice_count: u32,
    pub slice_quantity: Decimal,
    /// Final slice quantity: `slice_quantity` plus the lot-rounding remainder,
    /// so the slice quantities sum to the total exactly.
    pub final_slice_quantity: Decimal,
    pub interval: Duration,
    pub limit_price_ceiling: Option<Price>,
    pub slices: Vec<TwapSlice>,
}

impl TwapPlan {
    pub fn build(
        id: PlanId,
        cfg: &TwapConfig,
        rules: &SymbolRules,
        now: Timestamp,
    ) -> Result<Self, PlanError> {
        if cfg.slice_count == 0 {
            return Err(PlanError::InvalidSliceCount(cfg.slice_count));
        }

        let validated = rules.validate(cfg.total_quantity, cfg.limit_price_ceiling)?;
        let total = validated.quantity;

        let count = Decimal::from(cfg.slice_count);
        let slice_quantity = align_down(total / count, rules.lot_size);
        if slice_quantity < rules.min_quantity {
            return Err(PlanError::SliceTooSmall {
                slice: slice_quantity,
                minimum: rules.min_quantity,
            });
        }
        // each slice is its own order; the notional floor applies per slice,
        // not to the parent quantity
        if let Some(ceiling) = validated.price {
            let notional = slice_quantity * ceiling.value();
            if notional < rules.min_notional {
                return Err(PlanError::Rules(RuleError::BelowMinNotional {
                    notional,
                    minimum: rules.min_notional,
                }));
            }
        }

        let final_slice_quantity =
            total - slice_quantity * Decimal::from(cfg.slice_count - 1);
        debug_assert_eq!(
            slice_quantity * Decimal::from(cfg.slice_count - 1) + final_slice_quantity,
            total
        );

        let interval = Duration::from_millis(
            (cfg.duration.as_millis() / u128::from(cfg.slice_count)) as u64,
        );

        let slices = (0..cfg.slice_count)
            .map(|index| TwapSlice {
                index,
                quantity: if index + 1 == cfg.slice_count {
                    final_slice_quantity
                } else {
                    slice_quantity
                },
                order: None,
                executed_quantity: Decimal::ZERO,
                executed_price: None,
                failure: None,
            })
            .collect();

        Ok(Self {
            core: PlanCore::new(id, cfg.symbol.clone(), cfg.side, total, now),
            slice_count: cfg.slice_count,
            slice_quantity,
            final_slice_quantity,
            interval,
            limit_price_ceiling: validated.price,
            slices,
        })
    }

    /// Quantity actually executed across all slices so far.
    pub fn executed_quantity(&self) -> Decimal {
        self.slices.iter().map(|s| s.executed_quantity).sum()
    }
}

// 8.2: Grid - a ladder of resting limit orders across a price range.

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridLevel {
    pub index: u32,
    pub price: Price,
    /// Orientation of the current (or next) order at this level. None for the
    /// level parked exactly at the seed price, which starts unseeded.
    pub side: Option<Side>,
    pub order: Option<OrderHandle>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridPlan {
    pub core: PlanCore,
    pub lower_price: Price,
    pub upper_price: Price,
    pub level_count: u32,
    pub quantity_per_level: Decimal,
    /// Price distance between adjacent levels.
    pub step: Decimal,
    /// Mark price observed at plan creation; decides initial level sides.
    pub seed_price: Price,
    pub levels: Vec<GridLevel>,
}

impl GridPlan {
    pub fn build(
        id: PlanId,
        cfg: &GridConfig,
        rules: &SymbolRules,
        seed_price: Price,
        now: Timestamp,
    ) -> Result<Self, PlanError> {
        if cfg.lower_price >= cfg.upper_price {
            return Err(PlanError::InvalidPriceRange {
                lower: cfg.lower_price,
                upper: cfg.upper_price,
            });
        }
        if cfg.level_count < 2 {
            return Err(PlanError::TooFewLevels(cfg.level_count));
        }

        // notional is smallest at the bottom of the range; validate there
        let validated = rules.validate(cfg.quantity_per_level, Some(cfg.lower_price))?;

        let raw = grid_prices(cfg.lower_price, cfg.upper_price, cfg.level_count)?;
        let mut levels = Vec::with_capacity(raw.len());
        let mut previous: Option<Price> = None;
        for (i, price) in raw.into_iter().enumerate() {
            let aligned = rules.align_price(price)?;
            if let Some(prev) = previous {
                if aligned <= prev {
                    return Err(PlanError::LevelsCollide { index: i as u32 });
                }
            }
            previous = Some(aligned);

            let side = if aligned < seed_price {
                Some(Side::Buy)
            } else if aligned > seed_price {
                Some(Side::Sell)
            } else {
                None
            };
            levels.push(GridLevel {
                index: i as u32,
                price: aligned,
                side,
                order: None,
            });
        }

        let step = (cfg.upper_price.value() - cfg.lower_price.value())
            / Decimal::from(cfg.level_count - 1);
        let total = validated.quantity * Decimal::from(cfg.level_count);

        // grid side alternates per level; the core side records the first
        // order the ladder would take at the seed price
        let side = if seed_price <= cfg.lower_price {
            Side::Sell
        } else {
            Side::Buy
        };

        Ok(Self {
            core: PlanCore::new(id, cfg.symbol.clone(), side, total, now),
            lower_price: cfg.lower_price,
            upper_price: cfg.upper_price,
            level_count: cfg.level_count,
            quantity_per_level: validated.quantity,
            step,
            seed_price,
            levels,
        })
    }

    /// Number of levels currently holding a live order handle.
    pub fn seeded_levels(&self) -> usize {
        self.levels.iter().filter(|l| l.order.is_some()).count()
    }
}

/// Partition `[lower, upper]` into `count` equally spaced prices, bounds
/// inclusive. Pure; tick alignment happens against symbol rules afterwards.
pub fn grid_prices(lower: Price, upper: Price, count: u32) -> Result<Vec<Price>, PlanError> {
    if lower >= upper {
        return Err(PlanError::InvalidPriceRange { lower, upper });
    }
    if count < 2 {
        return Err(PlanError::TooFewLevels(count));
    }

    let step = (upper.value() - lower.value()) / Decimal::from(count - 1);
    let mut prices = Vec::with_capacity(count as usize);
    for i in 0..count {
        let price = if i + 1 == count {
            // pin the top level to the exact bound; accumulated division
            // error must not leak into the ladder
            upper
        } else {
            Price::new_unchecked(lower.value() + step * Decimal::from(i))
        };
        prices.push(price);
    }
    Ok(prices)
}

// 8.3: OCO - two linked exit legs, at most one survives.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OcoLinkState {
    BothLive,
    OneFilled,
    BothCanceled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcoPlan {
    pub core: PlanCore,
    pub take_profit: OrderHandle,
    pub stop: OrderHandle,
    pub link_state: OcoLinkState,
}

impl OcoPlan {
    pub fn new(
        id: PlanId,
        symbol: Symbol,
        side: Side,
        quantity: Decimal,
        take_profit: OrderHandle,
        stop: OrderHandle,
        now: Timestamp,
    ) -> Self {
        let mut core = PlanCore::new(id, symbol, side, quantity, now);
        core.transition(PlanStatus::Running);
        Self {
            core,
            take_profit,
            stop,
            link_state: OcoLinkState::BothLive,
        }
    }
}

// 8.4: client-side stop-limit - armed until the price crosses the stop.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerState {
    Armed,
    Triggered,
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopLimitPlan {
    pub core: PlanCore,
    pub stop_price: Price,
    pub limit_price: Price,
    pub trigger_state: TriggerState,
    /// The limit order, populated only after the trigger fires.
    pub order: Option<OrderHandle>,
}

impl StopLimitPlan {
    pub fn new(
        id: PlanId,
        symbol: Symbol,
        side: Side,
        quantity: Decimal,
        stop_price: Price,
        limit_price: Price,
        now: Timestamp,
    ) -> Self {
        Self {
            core: PlanCore::new(id, symbol, side, quantity, now),
            stop_price,
            limit_price,
            trigger_state: TriggerState::Armed,
            order: None,
        }
    }
}

/// Tagged union over the strategy variants. Lets the host hold heterogeneous
/// plans and lets shared machinery (events, reporting) treat them uniformly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StrategyPlan {
    Twap(TwapPlan),
    Grid(GridPlan),
    Oco(OcoPlan),
    StopLimit(StopLimitPlan),
}

impl StrategyPlan {
    pub fn kind(&self) -> PlanKind {
        match self {
            StrategyPlan::Twap(_) => PlanKind::Twap,
            StrategyPlan::Grid(_) => PlanKind::Grid,
            StrategyPlan::Oco(_) => PlanKind::Oco,
            StrategyPlan::StopLimit(_) => PlanKind::StopLimit,
        }
    }

    pub fn core(&self) -> &PlanCore {
        match self {
            StrategyPlan::Twap(p) => &p.core,
            StrategyPlan::Grid(p) => &p.core,
            StrategyPlan::Oco(p) => &p.core,
            StrategyPlan::StopLimit(p) => &p.core,
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum PlanError {
    #[error("slice count must be at least 1, got {0}")]
    InvalidSliceCount(u32),

    #[error("slice quantity {slice} below minimum {minimum}; fewer slices needed")]
    SliceTooSmall { slice: Decimal, minimum: Decimal },

    #[error("lower price {lower} must be below upper price {upper}")]
    InvalidPriceRange { lower: Price, upper: Price },

    #[error("grid needs at least 2 levels, got {0}")]
    TooFewLevels(u32),

    #[error("grid levels collide after tick alignment at index {index}")]
    LevelsCollide { index: u32 },

    #[error(transparent)]
    Rules(#[from] RuleError),
}
