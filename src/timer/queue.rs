use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use super::entry::{Entry, TimerAction, TimerMode};
use super::id::TimerId;

/// Pending timers ordered by deadline
///
/// Keys pair the deadline with the timer id so that timers sharing a
/// deadline expire in the order they were scheduled. A side index maps ids
/// back to deadlines to make cancellation a direct lookup.
#[derive(Debug, Default)]
pub struct TimerQueue {
    entries: BTreeMap<(Instant, TimerId), Entry>,
    deadlines: HashMap<TimerId, Instant>,
    referenced: usize,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules a timer to expire at the specified time
    ///
    /// Returns a TimerId that can be used to cancel the timer
    pub fn schedule(&mut self, at: Instant, mode: TimerMode, action: TimerAction) -> TimerId {
        let id = TimerId::new();
        if mode.is_referenced() {
            self.referenced += 1;
        }
        self.deadlines.insert(id, at);
        self.entries.insert((at, id), Entry { id, mode, action });
        id
    }

    /// Attempts to cancel a timer with the given ID
    ///
    /// Returns true if the timer was found and cancelled, false otherwise
    pub fn cancel(&mut self, id: TimerId) -> bool {
        self.remove(id).is_some()
    }

    /// Removes a pending timer and hands back its entry
    ///
    /// Lets the caller drop the entry's action outside of any borrow of the
    /// queue.
    pub fn remove(&mut self, id: TimerId) -> Option<Entry> {
        let at = self.deadlines.remove(&id)?;
        let entry = self.entries.remove(&(at, id))?;
        self.forget(&entry);
        Some(entry)
    }

    /// Replace the waker of a pending sleep
    ///
    /// Returns false if the timer is gone or does not wake a task.
    pub fn update_waker(&mut self, id: TimerId, waker: &std::task::Waker) -> bool {
        let Some(at) = self.deadlines.get(&id) else {
            return false;
        };
        match self.entries.get_mut(&(*at, id)) {
            Some(Entry {
                action: TimerAction::Wake(current),
                ..
            }) => {
                if !current.will_wake(waker) {
                    *current = waker.clone();
                }
                true
            }
            _ => false,
        }
    }

    /// Removes every timer due at `now`, earliest deadline first
    pub fn expire(&mut self, now: Instant) -> Vec<Entry> {
        let pending = self.entries.split_off(&(now, TimerId::MAX));
        let expired = std::mem::replace(&mut self.entries, pending);

        let expired: Vec<Entry> = expired.into_values().collect();
        for entry in &expired {
            self.deadlines.remove(&entry.id);
            self.forget(entry);
        }
        expired
    }

    /// The earliest pending deadline, if any
    pub fn next_deadline(&self) -> Option<Instant> {
        self.entries.keys().next().map(|(at, _)| *at)
    }

    /// Returns the number of pending timers
    pub fn pending_count(&self) -> usize {
        self.entries.len()
    }

    /// Returns the number of pending timers that keep the event loop alive
    pub fn referenced_count(&self) -> usize {
        self.referenced
    }

    fn forget(&mut self, entry: &Entry) {
        if entry.mode.is_referenced() {
            self.referenced -= 1;
        }
    }
}
