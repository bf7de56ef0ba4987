//! Virtual time

use std::cell::Cell;
use std::rc::Rc;

use mhscpu_core::bus::Clock;

/// Shared virtual microsecond clock
///
/// Clones share one counter, so a simulated device holding a clone sees
/// the time the controller spends in `delay_us`. Time only moves when
/// someone delays or calls [`advance`](Self::advance).
#[derive(Debug, Clone, Default)]
pub struct SimClock {
    now: Rc<Cell<u64>>,
}

impl SimClock {
    /// Create a clock at t = 0
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time in microseconds
    pub fn now(&self) -> u64 {
        self.now.get()
    }

    /// Move time forward
    pub fn advance(&self, us: u64) {
        self.now.set(self.now.get().saturating_add(us));
    }
}

impl Clock for SimClock {
    fn now_us(&self) -> u64 {
        self.now()
    }

    fn delay_us(&mut self, us: u32) {
        // A zero delay would spin a polling loop forever.
        self.advance(u64::from(us.max(1)));
    }
}
