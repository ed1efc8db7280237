//! The consumer-side view of a cancellation flag

use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll, Waker};

use crate::config::EXPECTED_LISTENER_COUNT;

type Listener = Box<dyn FnOnce() + Send>;

/// Shared state behind a token: the latch plus its pending listeners.
pub(crate) struct Inner {
    cancelled: AtomicBool,
    listeners: Mutex<Listeners>,
}

struct Listeners {
    next_id: u64,
    entries: Vec<(u64, Listener)>,
}

impl Inner {
    fn new(cancelled: bool) -> Self {
        Self {
            cancelled: AtomicBool::new(cancelled),
            listeners: Mutex::new(Listeners {
                next_id: 0,
                entries: Vec::with_capacity(EXPECTED_LISTENER_COUNT),
            }),
        }
    }

    /// Flips the latch and runs every pending listener in registration order.
    ///
    /// Returns `false` if the token was already cancelled.
    pub(crate) fn cancel(&self) -> bool {
        let drained = {
            let mut listeners = self.listeners.lock();
            if self.cancelled.swap(true, Ordering::SeqCst) {
                return false;
            }
            std::mem::take(&mut listeners.entries)
        };

        tracing::trace!(listeners = drained.len(), "cancellation requested");
        for (_, listener) in drained {
            listener();
        }
        true
    }

    /// Queues a listener, or hands it back if the latch is already set.
    fn register(&self, listener: Listener) -> Result<u64, Listener> {
        let mut listeners = self.listeners.lock();
        if self.cancelled.load(Ordering::SeqCst) {
            return Err(listener);
        }
        let id = listeners.next_id;
        listeners.next_id += 1;
        listeners.entries.push((id, listener));
        Ok(id)
    }

    fn deregister(&self, id: u64) -> bool {
        // Dropped outside the lock; a listener may own registrations of its own.
        let removed = {
            let mut listeners = self.listeners.lock();
            listeners
                .entries
                .iter()
                .position(|(entry, _)| *entry == id)
                .map(|pos| listeners.entries.remove(pos))
        };
        removed.is_some()
    }

    fn listener_count(&self) -> usize {
        self.listeners.lock().entries.len()
    }
}

/// A read-only view of a cancellation flag.
///
/// Tokens are cheap to clone; every clone observes the same flag. Only the
/// owning [`CancellationTokenSource`](super::CancellationTokenSource) can
/// request cancellation.
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

impl CancellationToken {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(Inner::new(false)),
        }
    }

    /// A token that is never cancelled.
    pub fn none() -> Self {
        Self::new()
    }

    /// A token that is cancelled from the start.
    pub fn already_cancelled() -> Self {
        Self {
            inner: Arc::new(Inner::new(true)),
        }
    }

    /// Check if cancellation has been requested
    pub fn is_cancellation_requested(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Register a listener that runs once when cancellation is requested.
    ///
    /// If the token is already cancelled the listener runs immediately, on
    /// the calling thread, before this method returns.
    pub fn on_cancelled<F>(&self, listener: F) -> CancellationRegistration
    where
        F: FnOnce() + Send + 'static,
    {
        match self.inner.register(Box::new(listener)) {
            Ok(id) => CancellationRegistration {
                token: Arc::downgrade(&self.inner),
                id: Some(id),
            },
            Err(listener) => {
                listener();
                CancellationRegistration {
                    token: Weak::new(),
                    id: None,
                }
            }
        }
    }

    /// A future that resolves once cancellation is requested.
    pub fn cancelled(&self) -> Cancelled {
        Cancelled {
            token: self.clone(),
            waker: Arc::new(Mutex::new(None)),
            registration: None,
        }
    }

    /// Number of listeners still waiting for cancellation.
    pub fn listener_count(&self) -> usize {
        self.inner.listener_count()
    }

    pub(crate) fn downgrade(&self) -> Weak<Inner> {
        Arc::downgrade(&self.inner)
    }

    pub(crate) fn trigger(&self) -> bool {
        self.inner.cancel()
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::none()
    }
}

impl fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancellation_requested())
            .finish()
    }
}

/// Handle to a listener registered with [`CancellationToken::on_cancelled`].
///
/// Dropping the registration removes the listener. It holds only a weak
/// reference to the token, so it never keeps the token's state alive.
#[must_use = "dropping a registration removes its listener"]
pub struct CancellationRegistration {
    token: Weak<Inner>,
    id: Option<u64>,
}

impl CancellationRegistration {
    /// Remove the listener.
    ///
    /// Returns `true` if the listener was still pending, `false` if it has
    /// already run.
    pub fn dispose(mut self) -> bool {
        self.release()
    }

    /// Keep the listener registered for as long as the token lives.
    pub fn forget(mut self) {
        self.id = None;
    }

    fn release(&mut self) -> bool {
        match (self.id.take(), self.token.upgrade()) {
            (Some(id), Some(inner)) => inner.deregister(id),
            _ => false,
        }
    }
}

impl Drop for CancellationRegistration {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for CancellationRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationRegistration")
            .field("id", &self.id)
            .finish()
    }
}

/// Future returned by [`CancellationToken::cancelled`].
pub struct Cancelled {
    token: CancellationToken,
    waker: Arc<Mutex<Option<Waker>>>,
    registration: Option<CancellationRegistration>,
}

impl Future for Cancelled {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.token.is_cancellation_requested() {
            self.registration = None;
            return Poll::Ready(());
        }

        *self.waker.lock() = Some(cx.waker().clone());

        if self.registration.is_none() {
            let slot = self.waker.clone();
            let registration = self.token.on_cancelled(move || {
                if let Some(waker) = slot.lock().take() {
                    waker.wake();
                }
            });
            self.registration = Some(registration);
        }

        // The listener may have fired between the check above and registering.
        if self.token.is_cancellation_requested() {
            self.registration = None;
            Poll::Ready(())
        } else {
            Poll::Pending
        }
    }
}
