//! Single-threaded executor with an event loop and panic isolation
//!
//! The runtime owns three things: spawned tasks, a ready queue of task ids,
//! and a [`TimerQueue`]. Each turn of the loop polls every ready task, then
//! fires every due timer. Timer callbacks run inline on the runtime thread,
//! so anything they trigger (cancellation listeners in particular) happens
//! within that turn.
//!
//! ## Liveness
//!
//! [`Runtime::run`] returns once no task is ready and no *referenced* timer
//! is pending. Tasks still waiting at that point can never be woken by the
//! runtime and stay parked until the runtime is dropped. Unreferenced timers
//! fire normally while the loop is running but do not keep it running.
//!
//! ## Panic Handling
//!
//! Every task poll is wrapped with `std::panic::catch_unwind`. A panicking
//! task is logged and dropped; other tasks continue. Its `JoinHandle` never
//! resolves.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::future::Future;
use std::rc::{Rc, Weak};
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::thread::Thread;
use std::time::{Duration, Instant};

use crossbeam_queue::SegQueue;

use crate::config::IDLE_PARK_TIMEOUT_MS;
use crate::error::{Error, Result};
use crate::runtime_context;
use crate::task::{JoinHandle, Task};
use crate::timer::{TimerAction, TimerDriver, TimerId, TimerMode, TimerQueue};
use crate::waker::{task_waker, RootWaker, TaskId};

/// A single-threaded async runtime
pub struct Runtime {
    core: Rc<Core>,
}

/// The state shared between the runtime and its handles
pub(crate) struct Core {
    tasks: RefCell<HashMap<TaskId, Task>>,
    ready_queue: Arc<SegQueue<TaskId>>,
    timers: RefCell<TimerQueue>,
    next_task_id: Cell<u64>,
    thread: Thread,
}

impl Runtime {
    /// Create a new runtime bound to the current thread
    pub fn new() -> Self {
        Self {
            core: Rc::new(Core {
                tasks: RefCell::new(HashMap::new()),
                ready_queue: Arc::new(SegQueue::new()),
                timers: RefCell::new(TimerQueue::new()),
                next_task_id: Cell::new(1),
                thread: std::thread::current(),
            }),
        }
    }

    /// A handle for spawning tasks and arming timers on this runtime
    pub fn handle(&self) -> Handle {
        Handle {
            core: Rc::downgrade(&self.core),
        }
    }

    /// Spawn a new task
    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + 'static,
        F::Output: 'static,
    {
        self.core.spawn(future)
    }

    /// Run a future to completion, driving spawned tasks and timers meanwhile
    pub fn block_on<F>(&self, future: F) -> F::Output
    where
        F: Future,
    {
        let _enter = runtime_context::enter(self.handle());
        let mut future = std::pin::pin!(future);

        let root = RootWaker::new(self.core.thread.clone());
        let waker = futures::task::waker(root.clone());
        let mut context = Context::from_waker(&waker);

        loop {
            if root.take_woken() {
                if let Poll::Ready(output) = future.as_mut().poll(&mut context) {
                    return output;
                }
            }

            let ticked = self.core.tick();
            let fired = self.core.fire_timers();

            if !ticked && !fired && !root.is_woken() && self.core.ready_queue.is_empty() {
                self.core.park(Duration::from_millis(IDLE_PARK_TIMEOUT_MS));
            }
        }
    }

    /// Run the event loop until it goes idle
    ///
    /// Returns once no task is ready to run and no referenced timer is
    /// pending.
    pub fn run(&self) {
        let _enter = runtime_context::enter(self.handle());

        loop {
            let ticked = self.core.tick();
            let fired = self.core.fire_timers();
            if ticked || fired || !self.core.ready_queue.is_empty() {
                continue;
            }

            if self.core.timers.borrow().referenced_count() == 0 {
                break;
            }
            self.core.park(Duration::MAX);
        }

        tracing::debug!(
            parked_tasks = self.task_count(),
            unreferenced_timers = self.pending_timers(),
            "event loop idle"
        );
    }

    /// Number of spawned tasks that have not completed
    pub fn task_count(&self) -> usize {
        self.core.tasks.borrow().len()
    }

    /// Number of timers waiting to fire
    pub fn pending_timers(&self) -> usize {
        self.core.timers.borrow().pending_count()
    }

    /// Number of pending timers that keep [`Runtime::run`] alive
    pub fn referenced_timers(&self) -> usize {
        self.core.timers.borrow().referenced_count()
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Core {
    fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + 'static,
        F::Output: 'static,
    {
        let task_id = TaskId(self.next_task_id.get());
        self.next_task_id.set(task_id.0 + 1);

        let (result, promise) = crate::future::defer();

        // Panics are caught at the polling level in tick()
        let wrapped_future = async move {
            promise.complete(future.await);
        };

        self.tasks
            .borrow_mut()
            .insert(task_id, Task::new(task_id, wrapped_future));
        self.ready_queue.push(task_id);

        JoinHandle::new(result)
    }

    /// Poll every task that was ready at the start of this turn
    fn tick(&self) -> bool {
        let mut made_progress = false;

        for _ in 0..self.ready_queue.len() {
            let Some(task_id) = self.ready_queue.pop() else {
                break;
            };
            let Some(mut task) = self.tasks.borrow_mut().remove(&task_id) else {
                // Woken more than once, or already finished.
                continue;
            };

            let waker = task_waker(task_id, self.ready_queue.clone(), self.thread.clone());
            let mut context = Context::from_waker(&waker);

            let poll_result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                task.poll(&mut context)
            }));

            match poll_result {
                Ok(Poll::Ready(())) => {}
                Ok(Poll::Pending) => {
                    self.tasks.borrow_mut().insert(task_id, task);
                }
                Err(_panic_payload) => {
                    tracing::error!(task_id = ?task.id(), "task panicked");
                }
            }
            made_progress = true;
        }

        made_progress
    }

    /// Fire every due timer in deadline order
    fn fire_timers(&self) -> bool {
        let expired = self.timers.borrow_mut().expire(Instant::now());
        let fired = !expired.is_empty();
        for entry in expired {
            tracing::trace!(id = ?entry.id, "timer fired");
            entry.fire();
        }
        fired
    }

    /// Park until the next timer is due, or at most `idle` when none is pending
    fn park(&self, idle: Duration) {
        let timeout = match self.timers.borrow().next_deadline() {
            Some(deadline) => deadline.saturating_duration_since(Instant::now()),
            None => idle,
        };
        if !timeout.is_zero() {
            std::thread::park_timeout(timeout);
        }
    }
}

/// A cloneable reference to a runtime
///
/// Handles hold the runtime weakly; once the runtime is dropped, spawning
/// does nothing and timers are never armed.
#[derive(Clone)]
pub struct Handle {
    core: Weak<Core>,
}

impl Handle {
    /// The runtime driving the current thread
    ///
    /// # Panics
    ///
    /// Panics when called outside of `Runtime::block_on` or `Runtime::run`.
    pub fn current() -> Self {
        match Self::try_current() {
            Ok(handle) => handle,
            Err(err) => panic!("{err}: must be called from within a runtime"),
        }
    }

    /// The runtime driving the current thread, if any
    pub fn try_current() -> Result<Self> {
        runtime_context::current().ok_or(Error::NotInitialized)
    }

    /// Spawn a task onto the runtime
    ///
    /// If the runtime has been dropped the future is dropped as well and the
    /// returned handle never resolves.
    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + 'static,
        F::Output: 'static,
    {
        match self.core.upgrade() {
            Some(core) => core.spawn(future),
            None => {
                tracing::warn!("spawn on a dropped runtime");
                let (result, _promise) = crate::future::defer();
                JoinHandle::new(result)
            }
        }
    }

    pub(crate) fn schedule_wake(&self, deadline: Instant, waker: Waker) -> TimerId {
        match self.core.upgrade() {
            Some(core) => core
                .timers
                .borrow_mut()
                .schedule(deadline, TimerMode::Referenced, TimerAction::Wake(waker)),
            None => TimerId::new(),
        }
    }

    pub(crate) fn update_waker(&self, id: TimerId, waker: &Waker) -> bool {
        self.core
            .upgrade()
            .map(|core| core.timers.borrow_mut().update_waker(id, waker))
            .unwrap_or(false)
    }
}

impl TimerDriver for Handle {
    fn arm(&self, delay: Duration, mode: TimerMode, on_fire: Box<dyn FnOnce()>) -> TimerId {
        match self.core.upgrade() {
            Some(core) => {
                let deadline = Instant::now() + delay;
                core.timers
                    .borrow_mut()
                    .schedule(deadline, mode, TimerAction::Fire(on_fire))
            }
            None => TimerId::new(),
        }
    }

    fn clear(&self, id: TimerId) -> bool {
        let Some(core) = self.core.upgrade() else {
            return false;
        };
        // Dropped after the borrow ends; callbacks may own other timers.
        let removed = core.timers.borrow_mut().remove(id);
        removed.is_some()
    }
}
