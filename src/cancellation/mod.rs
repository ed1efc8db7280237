//! Cancellation tokens for cooperative cancellation
//!
//! A [`CancellationTokenSource`] owns a [`CancellationToken`] and is the only
//! thing that can cancel it. Tokens are handed to operations, which poll
//! [`CancellationToken::is_cancellation_requested`], register listeners with
//! [`CancellationToken::on_cancelled`], or await [`CancellationToken::cancelled`].
//!
//! Sources form a tree: a source linked to a parent token is cancelled when
//! the parent is. Cancellation is monotonic and every listener runs at most
//! once, synchronously, on the thread that requested cancellation.

use pin_project::pin_project;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::error::TaskCancelledError;

mod source;
mod token;

pub use source::CancellationTokenSource;
pub use token::{CancellationRegistration, CancellationToken, Cancelled};

/// Extension trait for futures that should stop early on cancellation
pub trait CancellableFutureExt: Future + Sized {
    /// Resolve to `Err(TaskCancelledError)` as soon as `token` is cancelled.
    ///
    /// The inner future is dropped with the wrapper; it is not polled again
    /// once cancellation has been observed.
    fn cancellable(self, token: &CancellationToken) -> CancellableFuture<Self> {
        CancellableFuture {
            inner: self,
            cancelled: token.cancelled(),
        }
    }
}

impl<F: Future> CancellableFutureExt for F {}

/// A future that can be cancelled
#[pin_project]
pub struct CancellableFuture<F> {
    #[pin]
    inner: F,
    cancelled: Cancelled,
}

impl<F: Future> Future for CancellableFuture<F> {
    type Output = Result<F::Output, TaskCancelledError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();

        // Check for cancellation
        if Pin::new(this.cancelled).poll(cx).is_ready() {
            return Poll::Ready(Err(TaskCancelledError));
        }

        this.inner.poll(cx).map(Ok)
    }
}
