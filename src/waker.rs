//! Wakers that integrate with the executor
//!
//! Spawned tasks are woken by pushing their id onto the executor's ready
//! queue; the root future of `block_on` is woken through a flag. Both
//! unpark the runtime thread so a parked loop notices the wake-up.

use crossbeam_queue::SegQueue;
use futures::task::ArcWake;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::Waker;
use std::thread::Thread;

/// A task ID that uniquely identifies a task in the executor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(pub(crate) u64);

/// Waker implementation that can reschedule tasks
struct TaskWaker {
    task_id: TaskId,
    queue: Arc<SegQueue<TaskId>>,
    thread: Thread,
}

impl ArcWake for TaskWaker {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        arc_self.queue.push(arc_self.task_id);
        arc_self.thread.unpark();
    }
}

/// Create a waker that puts `task_id` back on the ready queue
pub(crate) fn task_waker(task_id: TaskId, queue: Arc<SegQueue<TaskId>>, thread: Thread) -> Waker {
    futures::task::waker(Arc::new(TaskWaker {
        task_id,
        queue,
        thread,
    }))
}

/// Wake flag for the future driven by `block_on`
pub(crate) struct RootWaker {
    woken: AtomicBool,
    thread: Thread,
}

impl RootWaker {
    /// Starts woken so the root future gets its first poll.
    pub(crate) fn new(thread: Thread) -> Arc<Self> {
        Arc::new(Self {
            woken: AtomicBool::new(true),
            thread,
        })
    }

    pub(crate) fn take_woken(&self) -> bool {
        self.woken.swap(false, Ordering::SeqCst)
    }

    pub(crate) fn is_woken(&self) -> bool {
        self.woken.load(Ordering::SeqCst)
    }
}

impl ArcWake for RootWaker {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        arc_self.woken.store(true, Ordering::SeqCst);
        arc_self.thread.unpark();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_waker_creation() {
        let queue = Arc::new(SegQueue::new());
        let task_id = TaskId(42);

        let waker = task_waker(task_id, queue.clone(), std::thread::current());
        waker.wake();

        assert_eq!(queue.pop(), Some(task_id));
    }

    #[test]
    fn test_waker_clone() {
        let queue = Arc::new(SegQueue::new());
        let task_id = TaskId(99);

        let waker1 = task_waker(task_id, queue.clone(), std::thread::current());
        let waker2 = waker1.clone();

        waker1.wake();
        waker2.wake();

        assert_eq!(queue.pop(), Some(task_id));
        assert_eq!(queue.pop(), Some(task_id));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn test_root_waker_flag() {
        let root = RootWaker::new(std::thread::current());
        assert!(root.take_woken());
        assert!(!root.is_woken());

        futures::task::waker(root.clone()).wake_by_ref();
        assert!(root.is_woken());
        assert!(root.take_woken());
    }
}
