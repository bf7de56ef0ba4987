//! Deadlines for bounded waits

use super::Clock;

/// Point in time after which a wait gives up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at_us: u64,
}

impl Deadline {
    /// Deadline `timeout_us` from now
    pub fn after<C: Clock + ?Sized>(clock: &C, timeout_us: u64) -> Self {
        Self {
            at_us: clock.now_us().saturating_add(timeout_us),
        }
    }

    /// Whether the deadline has passed
    pub fn expired<C: Clock + ?Sized>(&self, clock: &C) -> bool {
        clock.now_us() >= self.at_us
    }

    /// Microseconds left, zero once expired
    pub fn remaining_us<C: Clock + ?Sized>(&self, clock: &C) -> u64 {
        self.at_us.saturating_sub(clock.now_us())
    }
}
