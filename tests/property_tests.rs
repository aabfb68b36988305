//! Property-based tests for the plan math.
//!
//! These tests verify invariants hold under random inputs.

use exec_core::*;
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::time::Duration;

// Strategies for generating test data
fn quantity_strategy() -> impl Strategy<Value = Decimal> {
    (10i64..1_000_000i64).prop_map(|x| Decimal::new(x, 3)) // 0.010 to 1000.0
}

fn price_strategy() -> impl Strategy<Value = Decimal> {
    (1_000i64..100_000_00i64).prop_map(|x| Decimal::new(x, 2)) // $10 to $100k
}

fn lot_strategy() -> impl Strategy<Value = Decimal> {
    prop_oneof![
        Just(dec!(0.001)),
        Just(dec!(0.01)),
        Just(dec!(0.1)),
        Just(dec!(1)),
    ]
}

fn rules_with_lot(lot: Decimal) -> SymbolRules {
    SymbolRules {
        tick_size: dec!(0.1),
        lot_size: lot,
        min_quantity: lot,
        min_notional: Decimal::ZERO,
    }
}

fn twap_config(total: Decimal, slices: u32) -> TwapConfig {
    TwapConfig {
        symbol: Symbol::new("BTCUSDT"),
        side: Side::Buy,
        total_quantity: total,
        duration: Duration::from_secs(600),
        slice_count: slices,
        limit_price_ceiling: None,
    }
}

proptest! {
    /// Slice quantities always sum to the lot-aligned total exactly; the
    /// remainder is absorbed by the final slice, never dropped.
    #[test]
    fn twap_slices_sum_to_total(
        total in quantity_strategy(),
        slices in 1u32..50,
        lot in lot_strategy(),
    ) {
        let rules = rules_with_lot(lot);
        let aligned_total = align_down(total, lot);

        if let Ok(plan) = TwapPlan::build(PlanId(1), &twap_config(total, slices), &rules, Timestamp(0)) {
            let sum: Decimal = plan.slices.iter().map(|s| s.quantity).sum();
            prop_assert_eq!(sum, aligned_total);
            prop_assert_eq!(plan.slices.len(), slices as usize);
        }
    }

    /// Every non-final slice is lot-aligned and the final slice carries at
    /// least the base slice quantity.
    #[test]
    fn twap_slice_alignment(
        total in quantity_strategy(),
        slices in 1u32..50,
        lot in lot_strategy(),
    ) {
        let rules = rules_with_lot(lot);

        if let Ok(plan) = TwapPlan::build(PlanId(1), &twap_config(total, slices), &rules, Timestamp(0)) {
            for slice in &plan.slices[..plan.slices.len() - 1] {
                prop_assert_eq!(align_down(slice.quantity, lot), slice.quantity);
            }
            prop_assert!(plan.final_slice_quantity >= plan.slice_quantity);
        }
    }

    /// The interval is the duration split evenly across slices.
    #[test]
    fn twap_interval_division(slices in 1u32..50) {
        let rules = rules_with_lot(dec!(0.001));
        let plan = TwapPlan::build(
            PlanId(1),
            &twap_config(dec!(100), slices),
            &rules,
            Timestamp(0),
        ).unwrap();

        prop_assert_eq!(
            plan.interval.as_millis(),
            Duration::from_secs(600).as_millis() / u128::from(slices)
        );
    }

    /// Grid generation: exactly N levels, strictly increasing, bounds
    /// included.
    #[test]
    fn grid_levels_count_and_order(
        lower in price_strategy(),
        span in 100i64..100_000i64,
        count in 2u32..40,
    ) {
        let upper = lower + Decimal::new(span, 2);
        let prices = grid_prices(
            Price::new_unchecked(lower),
            Price::new_unchecked(upper),
            count,
        ).unwrap();

        prop_assert_eq!(prices.len(), count as usize);
        prop_assert_eq!(prices[0].value(), lower);
        prop_assert_eq!(prices[count as usize - 1].value(), upper);
        for pair in prices.windows(2) {
            prop_assert!(pair[0] < pair[1]);
        }
    }

    /// Levels below the seed are BUY, levels above are SELL, whatever the seed.
    #[test]
    fn grid_sides_partition_around_seed(
        seed in price_strategy(),
        count in 2u32..20,
    ) {
        let cfg = GridConfig {
            symbol: Symbol::new("BTCUSDT"),
            lower_price: Price::new_unchecked(dec!(40000)),
            upper_price: Price::new_unchecked(dec!(60000)),
            level_count: count,
            quantity_per_level: dec!(0.01),
        };
        let rules = SymbolRules::btc_usdt();

        if let Ok(plan) = GridPlan::build(PlanId(1), &cfg, &rules, Price::new_unchecked(seed), Timestamp(0)) {
            for level in &plan.levels {
                match level.side {
                    Some(Side::Buy) => prop_assert!(level.price.value() < seed),
                    Some(Side::Sell) => prop_assert!(level.price.value() > seed),
                    None => prop_assert_eq!(level.price.value(), seed),
                }
            }
        }
    }

    /// align_down never rounds up and stays within one step of the input.
    #[test]
    fn align_down_bounds(
        value in quantity_strategy(),
        lot in lot_strategy(),
    ) {
        let aligned = align_down(value, lot);
        prop_assert!(aligned <= value);
        prop_assert!(value - aligned < lot);
        prop_assert_eq!(align_down(aligned, lot), aligned);
    }

    /// Backoff delays never decrease and never exceed the cap.
    #[test]
    fn backoff_monotonic_and_capped(attempt in 1u32..100) {
        let policy = RetryPolicy::default();
        let delay = policy.delay_for(attempt);
        let next = policy.delay_for(attempt + 1);

        prop_assert!(delay <= policy.max_delay);
        prop_assert!(next >= delay);
    }
}
