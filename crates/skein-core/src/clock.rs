//! Time source for event timestamps.

use std::time::Instant;

/// Source of event timestamps, in nanoseconds since an arbitrary
/// per-clock origin.
///
/// The engine reads the clock once per admitted event, so
/// implementations must be cheap and callable from any thread.
pub trait Clock: Send + Sync + 'static {
    /// Current wall-monotonic time in nanoseconds.
    fn now_ns(&self) -> u64;

    /// Current thread CPU time in nanoseconds, if the platform offers it.
    fn thread_now_ns(&self) -> Option<u64> {
        None
    }
}

/// [`Clock`] backed by [`Instant`], with its origin at construction.
#[derive(Debug)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    /// Create a clock whose zero is "now".
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ns(&self) -> u64 {
        Instant::now().duration_since(self.origin).as_nanos() as u64
    }
}
