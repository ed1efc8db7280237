//! Task abstraction
//!
//! This module provides the Task type that wraps futures for execution
//! on the single-threaded runtime, and the JoinHandle used to await them.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::future::Deferred;
use crate::waker::TaskId;

/// A task wraps a future for execution in the runtime
pub(crate) struct Task {
    id: TaskId,
    future: Pin<Box<dyn Future<Output = ()>>>,
}

impl Task {
    /// Create a new task with the given future
    pub(crate) fn new(id: TaskId, future: impl Future<Output = ()> + 'static) -> Self {
        Self {
            id,
            future: Box::pin(future),
        }
    }

    /// Get the task ID
    pub(crate) fn id(&self) -> TaskId {
        self.id
    }

    /// Poll the task's future
    pub(crate) fn poll(&mut self, cx: &mut Context<'_>) -> Poll<()> {
        self.future.as_mut().poll(cx)
    }
}

/// A spawned task handle that can be awaited
///
/// Dropping the handle detaches the task; it keeps running on the runtime.
pub struct JoinHandle<T> {
    result: Deferred<T>,
}

impl<T> JoinHandle<T> {
    pub(crate) fn new(result: Deferred<T>) -> Self {
        Self { result }
    }

    /// Check if the task has completed
    pub fn is_finished(&self) -> bool {
        self.result.is_settled()
    }
}

impl<T> Future for JoinHandle<T> {
    type Output = T;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.result).poll(cx)
    }
}
