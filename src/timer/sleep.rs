use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use super::TimerDriver;
use crate::executor::Handle;

/// Future returned by [`sleep`](super::sleep)
///
/// The timer is registered with the current runtime on first poll and
/// removed again when the future completes or is dropped.
pub struct Sleep {
    deadline: Instant,
    timer: Option<(Handle, super::TimerId)>,
}

impl Sleep {
    pub fn new(duration: Duration) -> Self {
        Self {
            deadline: Instant::now() + duration,
            timer: None,
        }
    }

    pub fn is_elapsed(&self) -> bool {
        Instant::now() >= self.deadline
    }

    fn release(&mut self) {
        if let Some((handle, id)) = self.timer.take() {
            handle.clear(id);
        }
    }
}

impl Future for Sleep {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.is_elapsed() {
            self.release();
            return Poll::Ready(());
        }

        let registered = match &self.timer {
            Some((handle, id)) => handle.update_waker(*id, cx.waker()),
            None => false,
        };

        if !registered {
            let handle = Handle::current();
            let id = handle.schedule_wake(self.deadline, cx.waker().clone());
            self.timer = Some((handle, id));
        }

        Poll::Pending
    }
}

impl Drop for Sleep {
    fn drop(&mut self) {
        self.release();
    }
}
