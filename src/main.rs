//! Strategy Execution Engine Simulation.
//!
//! Drives every strategy type against the deterministic simulated exchange:
//! single-shot orders, TWAP slicing, grid seeding and re-seeding, OCO
//! linking, stop-limit triggering, and the failure-handling paths.

use exec_core::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::time::Duration;

fn main() {
    println!("Strategy Execution Engine Simulation");
    println!("Simulated exchange, scripted prices, no real time\n");

    scenario_1_single_orders();
    scenario_2_twap();
    scenario_3_grid();
    scenario_4_oco();
    scenario_5_stop_limit();
    scenario_6_failure_handling();
    scenario_7_dry_run();

    println!("\nAll simulations completed successfully.");
}

fn btc() -> Symbol {
    Symbol::new("BTCUSDT")
}

/// Simulated world listed with BTCUSDT at the given mark, plus an executor on it.
fn sim_executor(mark: Decimal) -> (SimControl, Executor<SimGateway, SimClock>) {
    let mut world = SimWorld::new();
    world.list_symbol(btc(), SymbolRules::btc_usdt(), mark);
    let control = SimControl::new(world);
    let (gateway, clock) = control.split();
    (control, Executor::new(gateway, clock, ExecConfig::default()))
}

fn print_plan(plan: &StrategyPlan) {
    let core = plan.core();
    println!(
        "  plan {:?} {:?}: {} {} {} -> {:?}",
        core.id, plan.kind(), core.side, core.total_quantity, core.symbol, core.status
    );
}

/// Market and limit orders through the shared submission path.
fn scenario_1_single_orders() {
    println!("Scenario 1: Single-Shot Orders\n");

    let (control, mut exec) = sim_executor(dec!(50000));

    let market = exec
        .submit_order(&OrderConfig {
            symbol: btc(),
            side: Side::Buy,
            quantity: dec!(0.01),
            price: None,
            stop_price: None,
        })
        .unwrap();
    println!(
        "  market BUY 0.01 -> {:?} @ {}",
        market.status,
        market.average_price.unwrap()
    );

    let limit = exec
        .submit_order(&OrderConfig {
            symbol: btc(),
            side: Side::Buy,
            quantity: dec!(0.01),
            price: Some(Price::new_unchecked(dec!(49500))),
            stop_price: None,
        })
        .unwrap();
    println!("  limit BUY 0.01 @ 49500 -> {:?}", limit.status);

    control.set_mark(&btc(), dec!(49400));
    println!(
        "  mark falls to 49400 -> {:?}\n",
        control.status_of(limit.handle).unwrap()
    );
}

/// TWAP: 1.0 BTC over 40 seconds in 4 slices of 0.25.
fn scenario_2_twap() {
    println!("Scenario 2: TWAP Execution\n");

    let (control, mut exec) = sim_executor(dec!(50000));

    // price drifts up while the schedule runs
    control.schedule_mark(btc(), 12_000, dec!(50100));
    control.schedule_mark(btc(), 25_000, dec!(50200));

    let report = exec
        .run_twap(&TwapConfig {
            symbol: btc(),
            side: Side::Buy,
            total_quantity: dec!(1.0),
            duration: Duration::from_secs(40),
            slice_count: 4,
            limit_price_ceiling: None,
        })
        .unwrap();

    for slice in &report.plan.slices {
        println!(
            "  slice {}/4: {} @ {}",
            slice.index + 1,
            slice.executed_quantity,
            slice.executed_price.unwrap()
        );
    }
    println!(
        "  executed {} BTC, weighted average {} (took {}s of sim time)",
        report.executed_quantity,
        report.average_price.unwrap(),
        control.now_ms() / 1000
    );
    print_plan(&StrategyPlan::Twap(report.plan));
    println!();
}

/// Grid: seed a 48k-52k ladder, watch it re-seed as the price swings.
fn scenario_3_grid() {
    println!("Scenario 3: Grid Trading\n");

    let (control, mut exec) = sim_executor(dec!(50000));

    let mut report = exec
        .run_grid(&GridConfig {
            symbol: btc(),
            lower_price: Price::new_unchecked(dec!(48000)),
            upper_price: Price::new_unchecked(dec!(52000)),
            level_count: 5,
            quantity_per_level: dec!(0.01),
        })
        .unwrap();

    println!(
        "  seeded {} levels, skipped {} (the 50000 level sits at the mark)",
        report.seeded, report.skipped
    );
    for level in &report.plan.levels {
        match (level.side, level.order) {
            (Some(side), Some(_)) => println!("    level {} @ {}: {} resting", level.index, level.price, side),
            _ => println!("    level {} @ {}: unseeded", level.index, level.price),
        }
    }

    // dip fills the 49000 buy; rally fills the re-seeded sells
    control.set_mark(&btc(), dec!(48900));
    let dip = exec.grid_poll_once(&mut report.plan).unwrap();
    control.set_mark(&btc(), dec!(51100));
    let rally = exec.grid_poll_once(&mut report.plan).unwrap();

    println!(
        "  dip: {} fill(s), {} respawn(s); rally: {} fill(s), {} respawn(s)",
        dip.fills, dip.respawns, rally.fills, rally.respawns
    );
    println!("  live orders on the exchange: {}\n", control.live_order_count());
}

/// OCO: the take-profit leg fills first; the stop leg is cancelled.
fn scenario_4_oco() {
    println!("Scenario 4: OCO Exit\n");

    let (control, mut exec) = sim_executor(dec!(50000));
    control.schedule_mark(btc(), 8_000, dec!(52100));

    let report = exec
        .run_oco(&OcoConfig {
            symbol: btc(),
            side: Side::Sell,
            quantity: dec!(0.01),
            take_profit_price: Price::new_unchecked(dec!(52000)),
            stop_price: Price::new_unchecked(dec!(49000)),
            stop_limit_price: None,
        })
        .unwrap();

    println!(
        "  link {:?}, filled leg {:?}",
        report.plan.link_state, report.filled_leg
    );
    println!(
        "  take-profit {:?}, stop {:?}\n",
        report.take_profit_status, report.stop_status
    );
}

/// Stop-limit: armed at 50k, fires when the mark falls through 49k.
fn scenario_5_stop_limit() {
    println!("Scenario 5: Stop-Limit Trigger\n");

    let (control, mut exec) = sim_executor(dec!(50000));
    control.schedule_mark(btc(), 12_000, dec!(48950));

    let report = exec
        .run_stop_limit(&StopLimitConfig {
            symbol: btc(),
            side: Side::Sell,
            quantity: dec!(0.01),
            stop_price: Price::new_unchecked(dec!(49000)),
            limit_price: Price::new_unchecked(dec!(48900)),
            max_wait: Some(Duration::from_secs(120)),
            on_immediate_trigger: ImmediateTriggerPolicy::Reject,
        })
        .unwrap();

    println!(
        "  trigger state {:?} after {}s, order {:?}\n",
        report.plan.trigger_state,
        control.now_ms() / 1000,
        report.order_status
    );
}

/// Transient faults are retried with backoff; a rejected grid level is
/// skipped while the rest of the ladder goes out.
fn scenario_6_failure_handling() {
    println!("Scenario 6: Failure Handling\n");

    let (control, mut exec) = sim_executor(dec!(50000));
    control.inject_fault(SimFault::Transient("connection reset".into()));
    control.inject_fault(SimFault::Transient("rate limited".into()));

    let report = exec
        .submit_order(&OrderConfig {
            symbol: btc(),
            side: Side::Buy,
            quantity: dec!(0.01),
            price: None,
            stop_price: None,
        })
        .unwrap();
    let retries = exec
        .events()
        .iter()
        .filter(|e| matches!(e.payload, EventPayload::RetryAttempted { .. }))
        .count();
    println!("  market order {:?} after {} retries", report.status, retries);

    let (control, mut exec) = sim_executor(dec!(50000));
    // second level placement gets rejected outright
    control.inject_fault(SimFault::Reject("insufficient margin".into()));
    let report = exec
        .run_grid(&GridConfig {
            symbol: btc(),
            lower_price: Price::new_unchecked(dec!(48000)),
            upper_price: Price::new_unchecked(dec!(52000)),
            level_count: 5,
            quantity_per_level: dec!(0.01),
        })
        .unwrap();
    println!(
        "  partial grid: {} seeded, {} skipped, status {:?}\n",
        report.seeded, report.skipped, report.plan.core.status
    );
}

/// Dry run: the no-op gateway acknowledges everything without an exchange.
fn scenario_7_dry_run() {
    println!("Scenario 7: Dry Run\n");

    let gateway = NoopGateway::new(Price::new_unchecked(dec!(50000)), SymbolRules::btc_usdt());
    let mut exec = Executor::new(gateway, SystemClock, ExecConfig::default());

    let report = exec
        .run_twap(&TwapConfig {
            symbol: btc(),
            side: Side::Buy,
            total_quantity: dec!(1.0),
            duration: Duration::ZERO, // no waits: walk the full path instantly
            slice_count: 4,
            limit_price_ceiling: None,
        })
        .unwrap();

    println!(
        "  dry-run TWAP: {} slices, {} executed, status {:?}",
        report.plan.slices.len(),
        report.executed_quantity,
        report.plan.core.status
    );
    println!("  events recorded: {}", exec.events().len());
}
