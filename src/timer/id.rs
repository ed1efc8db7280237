use std::sync::atomic::{AtomicU64, Ordering};

/// A unique identifier for a timer
///
/// Ids increase monotonically, so timers sharing a deadline fire in the
/// order they were armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(u64);

static TIMER_COUNTER: AtomicU64 = AtomicU64::new(1);

impl Default for TimerId {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerId {
    /// Upper bound used when splitting the queue at a deadline.
    pub(crate) const MAX: TimerId = TimerId(u64::MAX);

    /// Generates a new unique TimerId
    pub fn new() -> Self {
        TimerId(TIMER_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}
