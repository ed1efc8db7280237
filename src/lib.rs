//! rust-cutoff: timeout policies with linked cancellation tokens
//!
//! This crate runs a unit of work under a time budget on a minimal
//! single-threaded async runtime:
//!
//! - [`CancellationTokenSource`] / [`CancellationToken`] form a tree of
//!   cancellation scopes. Cancelling a parent cancels its children, never
//!   the other way round.
//! - [`TimeoutPolicy`] executes an operation under a fresh child scope and
//!   cancels it when the budget elapses, either waiting for the operation
//!   regardless ([`TimeoutStrategy::Cooperative`]) or abandoning it with a
//!   [`TaskCancelledError`] ([`TimeoutStrategy::Aggressive`]).
//! - [`Runtime`] is the event loop the policy's timers are armed on. Timers
//!   are *referenced* by default and keep [`Runtime::run`] alive while
//!   pending; [`TimeoutPolicy::dangerously_unref`] opts out.
//!
//! # Examples
//!
//! ```rust,no_run
//! use rust_cutoff::{timeout, timer, Runtime, TimeoutStrategy};
//! use std::time::Duration;
//!
//! let runtime = Runtime::new();
//! let policy = timeout(Duration::from_millis(5), TimeoutStrategy::Aggressive);
//!
//! let result = runtime.block_on(policy.execute(
//!     |context, _| async move {
//!         while !context.cancellation.is_cancellation_requested() {
//!             timer::sleep(Duration::from_millis(1)).await;
//!         }
//!         "stopped"
//!     },
//!     None,
//! ));
//!
//! assert!(result.is_err());
//! ```
//!
//! # Cancellation Scopes
//!
//! Tokens are `Send + Sync` and their listeners run synchronously on the
//! thread that requested cancellation, so a token created here can be
//! handed to code running on any executor.
//!
//! ```rust
//! use rust_cutoff::CancellationTokenSource;
//!
//! let parent = CancellationTokenSource::new();
//! let child = CancellationTokenSource::with_parent(parent.token());
//!
//! parent.cancel();
//! assert!(child.token().is_cancellation_requested());
//! ```

pub mod cancellation;
pub mod config;
pub mod error;
pub mod executor;
pub mod future;
pub mod policy;
pub mod task;
pub mod timer;
pub mod waker;

mod runtime_context;

// Re-export core types
pub use cancellation::{
    CancellableFutureExt, CancellationRegistration, CancellationToken, CancellationTokenSource,
};
pub use error::{Error, Result, TaskCancelledError};
pub use executor::{Handle, Runtime};
pub use future::{defer, Deferred, Promise};
pub use policy::{ExecutionContext, TimeoutPolicy, TimeoutStrategy};
pub use task::JoinHandle;
pub use timer::{sleep, ScopedTimer, TimerDriver, TimerId, TimerMode};

/// Create a timeout policy
pub fn timeout(duration: std::time::Duration, strategy: TimeoutStrategy) -> TimeoutPolicy {
    TimeoutPolicy::new(duration, strategy)
}

/// Convenience function to create a new runtime and run a future
pub fn block_on<F>(future: F) -> F::Output
where
    F: std::future::Future,
{
    let runtime = Runtime::new();
    runtime.block_on(future)
}
