// 10.0: every state change produces an event. the host drains these into its
// structured logger; the engine itself never formats or writes log lines.
// EventPayload lists all event types.

use crate::order::OrderType;
use crate::plan::PlanKind;
use crate::types::{ExchangeOrderId, OrderHandle, PlanId, Price, Side, Symbol, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub timestamp: Timestamp,
    pub payload: EventPayload,
}

/// Why an order was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CancelReason {
    UserRequested,
    /// The other OCO leg filled.
    SiblingFilled,
    /// The owning plan gave up (e.g. second OCO leg failed to place).
    PlanAborted,
    /// External cancellation signal while orders were still resting.
    Shutdown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    PlanCreated {
        plan_id: PlanId,
        kind: PlanKind,
        symbol: Symbol,
        side: Side,
        total_quantity: Decimal,
    },
    PlanCompleted {
        plan_id: PlanId,
    },
    PlanFailed {
        plan_id: PlanId,
        reason: String,
    },
    PlanCanceled {
        plan_id: PlanId,
    },

    OrderSubmitted {
        plan_id: PlanId,
        handle: OrderHandle,
        exchange_id: Option<ExchangeOrderId>,
        symbol: Symbol,
        side: Side,
        order_type: OrderType,
        quantity: Decimal,
        price: Option<Price>,
    },
    OrderFilled {
        plan_id: PlanId,
        handle: OrderHandle,
        executed_quantity: Decimal,
        average_price: Option<Price>,
    },
    OrderCanceled {
        plan_id: PlanId,
        handle: OrderHandle,
        reason: CancelReason,
    },
    OrderRejected {
        plan_id: PlanId,
        handle: OrderHandle,
        reason: String,
    },
    RetryAttempted {
        plan_id: PlanId,
        handle: OrderHandle,
        attempt: u32,
        delay_ms: u64,
        reason: String,
    },

    // TWAP progress
    SliceExecuted {
        plan_id: PlanId,
        index: u32,
        of: u32,
        quantity: Decimal,
        price: Option<Price>,
    },
    SliceFailed {
        plan_id: PlanId,
        index: u32,
        of: u32,
        reason: String,
    },

    // Grid progress
    LevelSeeded {
        plan_id: PlanId,
        index: u32,
        side: Side,
        price: Price,
    },
    LevelSkipped {
        plan_id: PlanId,
        index: u32,
        price: Price,
        reason: String,
    },
    LevelRespawned {
        plan_id: PlanId,
        index: u32,
        side: Side,
        price: Price,
    },

    // Stop-limit progress
    StopTriggered {
        plan_id: PlanId,
        mark_price: Price,
        stop_price: Price,
    },
    StopExpired {
        plan_id: PlanId,
        waited_ms: u64,
    },
}

/// Capped in-memory event log owned by the executor.
#[derive(Debug)]
pub struct EventLog {
    events: Vec<Event>,
    next_id: u64,
    max_events: usize,
    verbose: bool,
}

impl EventLog {
    pub fn new(max_events: usize, verbose: bool) -> Self {
        Self {
            events: Vec::new(),
            next_id: 1,
            max_events,
            verbose,
        }
    }

    pub fn emit(&mut self, timestamp: Timestamp, payload: EventPayload) {
        let event = Event {
            id: EventId(self.next_id),
            timestamp,
            payload,
        };
        self.next_id += 1;

        if self.verbose {
            println!("[event {}] {:?}", event.id.0, event.payload);
        }

        self.events.push(event);

        if self.events.len() > self.max_events {
            let drain_count = self.events.len() - self.max_events;
            self.events.drain(0..drain_count);
        }
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn recent(&self, count: usize) -> &[Event] {
        let start = self.events.len().saturating_sub(count);
        &self.events[start..]
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}
