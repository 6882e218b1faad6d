//! # Clock
//!
//! Source of "now" for deadline computation and `updated_at` stamps.
//! Injected into the tracker so tests can pin and advance time.

use crate::Timestamp;
use std::sync::{Arc, RwLock};

/// Source of the current time
pub trait Clock: Send + Sync {
    /// Current UTC time
    fn now(&self) -> Timestamp;
}

/// Wall clock backed by the system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// Manually driven clock for tests and simulations
///
/// Clones share the same underlying instant.
#[derive(Debug, Clone)]
pub struct ManualClock {
    current: Arc<RwLock<Timestamp>>,
}

impl ManualClock {
    /// Create a clock frozen at `start`
    pub fn new(start: Timestamp) -> Self {
        Self {
            current: Arc::new(RwLock::new(start)),
        }
    }

    /// Replace the current instant
    pub fn set(&self, instant: Timestamp) {
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        *current = instant;
    }

    /// Move the clock forward
    pub fn advance_minutes(&self, minutes: u32) {
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        *current = current.add_minutes(minutes);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.current.read().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
