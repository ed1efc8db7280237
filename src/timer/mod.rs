//! Timers driven by the runtime's event loop
//!
//! Every timer carries a [`TimerMode`] chosen when it is armed. Referenced
//! timers keep [`Runtime::run`](crate::Runtime::run) alive while pending;
//! unreferenced timers still fire on schedule but never hold the loop open
//! on their own.
//!
//! The [`TimerDriver`] trait is the seam between code that needs a
//! deadline and the runtime that owns the timer queue. [`ScopedTimer`]
//! clears its timer when dropped, so a timer armed for one operation never
//! outlives it.

use std::fmt;
use std::time::Duration;

pub mod entry;
pub mod id;
pub mod queue;
pub mod sleep;

pub use entry::{Entry, TimerAction, TimerMode};
pub use id::TimerId;
pub use queue::TimerQueue;
pub use sleep::Sleep;

/// Sleep for the given duration
///
/// The returned future must be polled from within a runtime.
///
/// # Examples
///
/// ```rust,no_run
/// use rust_cutoff::{timer, Runtime};
/// use std::time::Duration;
///
/// let runtime = Runtime::new();
/// runtime.block_on(async {
///     timer::sleep(Duration::from_millis(5)).await;
/// });
/// ```
pub fn sleep(duration: Duration) -> Sleep {
    Sleep::new(duration)
}

/// Schedules callbacks on an event loop
pub trait TimerDriver {
    /// Arm a timer that runs `on_fire` once `delay` has elapsed
    fn arm(&self, delay: Duration, mode: TimerMode, on_fire: Box<dyn FnOnce()>) -> TimerId;

    /// Clear a pending timer; returns false if it already fired or was cleared
    fn clear(&self, id: TimerId) -> bool;
}

/// A timer that is cleared when this guard is dropped
#[must_use = "dropping a ScopedTimer clears the timer"]
pub struct ScopedTimer<D: TimerDriver> {
    driver: D,
    id: TimerId,
}

impl<D: TimerDriver> ScopedTimer<D> {
    pub fn arm<F>(driver: D, delay: Duration, mode: TimerMode, on_fire: F) -> Self
    where
        F: FnOnce() + 'static,
    {
        let id = driver.arm(delay, mode, Box::new(on_fire));
        tracing::trace!(?id, ?delay, ?mode, "timer armed");
        Self { driver, id }
    }

    pub fn id(&self) -> TimerId {
        self.id
    }
}

impl<D: TimerDriver> Drop for ScopedTimer<D> {
    fn drop(&mut self) {
        if self.driver.clear(self.id) {
            tracing::trace!(id = ?self.id, "timer cleared before firing");
        }
    }
}

impl<D: TimerDriver> fmt::Debug for ScopedTimer<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedTimer").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    /// Records arm/clear calls instead of scheduling anything.
    #[derive(Clone, Default)]
    struct RecordingDriver {
        armed: Rc<RefCell<Vec<(TimerId, Duration, TimerMode)>>>,
        cleared: Rc<Cell<usize>>,
    }

    impl TimerDriver for RecordingDriver {
        fn arm(&self, delay: Duration, mode: TimerMode, _on_fire: Box<dyn FnOnce()>) -> TimerId {
            let id = TimerId::new();
            self.armed.borrow_mut().push((id, delay, mode));
            id
        }

        fn clear(&self, _id: TimerId) -> bool {
            self.cleared.set(self.cleared.get() + 1);
            true
        }
    }

    #[test]
    fn test_scoped_timer_clears_on_drop() {
        let driver = RecordingDriver::default();
        let timer = ScopedTimer::arm(
            driver.clone(),
            Duration::from_millis(10),
            TimerMode::Unreferenced,
            || {},
        );

        assert_eq!(
            driver.armed.borrow()[0],
            (timer.id(), Duration::from_millis(10), TimerMode::Unreferenced)
        );
        assert_eq!(driver.cleared.get(), 0);
        drop(timer);
        assert_eq!(driver.cleared.get(), 1);
    }

    #[test]
    fn test_default_mode_is_referenced() {
        assert_eq!(TimerMode::default(), TimerMode::Referenced);
        assert!(TimerMode::Referenced.is_referenced());
        assert!(!TimerMode::Unreferenced.is_referenced());
    }
}
