// exec-core: strategy execution engine for perpetual futures orders.
// deterministic core, gateway at the edge: every exchange effect goes through
// one trait, every wait goes through one clock, so the whole engine runs
// unchanged under the simulator.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: Symbol, OrderHandle, PlanId, Side, Price, Timestamp
//   2.x  order.rs: client-side orders: spec, status lifecycle, monotonic updates
//   3.x  rules.rs: tick/lot/notional validation with corrected values
//   4.x  gateway.rs: ExchangeGateway trait, error taxonomy, dry-run gateway
//   5.x  tracker.rs: order registry: place, refresh, cancel, reconcile
//   6.x  retry.rs: bounded exponential backoff policy
//   6.5  clock.rs: Clock trait, cancellation token
//   7.x  config.rs: typed per-strategy configs + engine settings
//   8.x  plan.rs: strategy plans: TWAP slicing, grid ladder, OCO link, stop arm
//   9.x  engine/: executor: single-shot, twap, grid, oco, stop_limit drivers
//   10.x events.rs: typed lifecycle events for the host's structured logger
//   11.x sim.rs: deterministic simulated exchange (scripted prices, faults)

// core data model
pub mod order;
pub mod plan;
pub mod rules;
pub mod types;

// execution engine
pub mod engine;
pub mod retry;
pub mod tracker;

// integration edges
pub mod clock;
pub mod config;
pub mod events;
pub mod gateway;
pub mod sim;

// re exports for convenience
pub use clock::*;
pub use config::*;
pub use engine::*;
pub use events::*;
pub use gateway::*;
pub use order::*;
pub use plan::*;
pub use retry::*;
pub use rules::*;
pub use tracker::*;
pub use types::*;
pub use sim::{SimClock, SimControl, SimFault, SimGateway, SimWorld};
