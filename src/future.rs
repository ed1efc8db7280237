//! Single-fire result slot
//!
//! A [`Deferred`] is the receiving half of a one-shot slot; any clone of its
//! [`Promise`] may settle it, and only the first writer wins. The timeout
//! engine uses this to race an operation against its timer without
//! cancelling whichever side loses.

use parking_lot::Mutex;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

/// The awaiting half of a one-shot slot
pub struct Deferred<T> {
    shared: Arc<Mutex<SharedState<T>>>,
}

/// The settling half of a one-shot slot
pub struct Promise<T> {
    shared: Arc<Mutex<SharedState<T>>>,
}

/// Shared state between Deferred and Promise
struct SharedState<T> {
    settled: bool,
    result: Option<T>,
    waker: Option<Waker>,
}

/// Create a new Deferred/Promise pair
pub fn defer<T>() -> (Deferred<T>, Promise<T>) {
    let shared = Arc::new(Mutex::new(SharedState {
        settled: false,
        result: None,
        waker: None,
    }));

    let deferred = Deferred {
        shared: shared.clone(),
    };
    let promise = Promise { shared };

    (deferred, promise)
}

impl<T> Deferred<T> {
    /// Check if the slot has been settled without polling
    pub fn is_settled(&self) -> bool {
        self.shared.lock().settled
    }
}

impl<T> std::future::Future for Deferred<T> {
    type Output = T;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut shared = self.shared.lock();

        if shared.settled {
            let result = shared
                .result
                .take()
                .expect("Deferred polled after completion");
            Poll::Ready(result)
        } else {
            shared.waker = Some(cx.waker().clone());
            Poll::Pending
        }
    }
}

impl<T> Promise<T> {
    /// Settle the slot with `value`.
    ///
    /// Returns `false` and discards `value` if the slot was already settled.
    pub fn complete(&self, value: T) -> bool {
        let waker = {
            let mut shared = self.shared.lock();
            if shared.settled {
                return false;
            }
            shared.settled = true;
            shared.result = Some(value);
            shared.waker.take()
        };

        if let Some(waker) = waker {
            waker.wake();
        }
        true
    }

    /// Check if the slot has been settled
    pub fn is_settled(&self) -> bool {
        self.shared.lock().settled
    }
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}
