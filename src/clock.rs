//! Time abstraction and cooperative cancellation.
//!
//! The engine never calls the system clock or sleeps directly; it goes through
//! `Clock`, so the whole execution path runs under a manual clock in tests and
//! in the simulator.

use crate::types::Timestamp;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub trait Clock {
    fn now(&self) -> Timestamp;

    /// Timed wait. The only suspension points in the engine are the TWAP
    /// inter-slice wait and the poll-interval waits, both of which land here.
    fn sleep(&mut self, duration: Duration);
}

/// Wall-clock time, real sleeps.
#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }

    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Shared cancellation flag. The host sets it (typically from an interrupt
/// handler); every engine loop checks it at the top of each iteration and
/// winds down to a safe stopping point.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_token_propagates_between_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());

        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn system_clock_advances() {
        let clock = SystemClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
