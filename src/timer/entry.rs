use super::id::TimerId;
use std::fmt;
use std::task::Waker;

/// Whether a pending timer keeps the runtime's event loop alive
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum TimerMode {
    /// `Runtime::run` keeps going while this timer is pending.
    #[default]
    Referenced,
    /// The timer fires if the loop is still running, but never keeps it running.
    Unreferenced,
}

impl TimerMode {
    pub fn is_referenced(self) -> bool {
        matches!(self, TimerMode::Referenced)
    }
}

/// What happens when a timer expires
pub enum TimerAction {
    /// Wake a task parked on a sleep.
    Wake(Waker),
    /// Run a callback on the runtime thread.
    Fire(Box<dyn FnOnce()>),
}

/// Represents an entry in the TimerQueue
pub struct Entry {
    pub id: TimerId,
    pub mode: TimerMode,
    pub action: TimerAction,
}

impl Entry {
    /// Consume the entry and perform its action
    pub fn fire(self) {
        match self.action {
            TimerAction::Wake(waker) => waker.wake(),
            TimerAction::Fire(callback) => callback(),
        }
    }
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let action = match self.action {
            TimerAction::Wake(_) => "wake",
            TimerAction::Fire(_) => "fire",
        };
        f.debug_struct("Entry")
            .field("id", &self.id)
            .field("mode", &self.mode)
            .field("action", &action)
            .finish()
    }
}
