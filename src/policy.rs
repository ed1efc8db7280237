//! Timeout policy
//!
//! A [`TimeoutPolicy`] runs an operation under a time budget. Each execution
//! gets a fresh [`CancellationTokenSource`], linked to the caller's token
//! when one is supplied, and arms a timer that cancels it once the budget
//! elapses. What happens next depends on the [`TimeoutStrategy`]:
//!
//! - [`TimeoutStrategy::Cooperative`] waits for the operation no matter
//!   how long it takes. The timer only flips the operation's token.
//! - [`TimeoutStrategy::Aggressive`] races the operation against the timer.
//!   If the timer wins, the execution fails with [`TaskCancelledError`]
//!   immediately; the operation keeps running on the runtime and whatever
//!   it eventually produces is discarded.
//!
//! The timer is cleared on every exit path, and by default it keeps
//! [`Runtime::run`](crate::Runtime::run) alive while pending. Call
//! [`TimeoutPolicy::dangerously_unref`] to arm unreferenced timers instead.

use futures::FutureExt;
use parking_lot::Mutex;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::rc::Rc;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::Poll;
use std::time::Duration;

use crate::cancellation::{CancellationToken, CancellationTokenSource};
use crate::error::{Error, Result, TaskCancelledError};
use crate::executor::Handle;
use crate::future::defer;
use crate::timer::{ScopedTimer, TimerMode};

/// How a policy reacts when its timer fires before the operation settles
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum TimeoutStrategy {
    /// Flip the cancellation flag and keep waiting for the operation.
    #[default]
    Cooperative,
    /// Flip the cancellation flag and fail with [`TaskCancelledError`] right away.
    Aggressive,
}

impl FromStr for TimeoutStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "cooperative" => Ok(TimeoutStrategy::Cooperative),
            "aggressive" => Ok(TimeoutStrategy::Aggressive),
            other => Err(Error::UnknownStrategy(other.to_string())),
        }
    }
}

impl fmt::Display for TimeoutStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeoutStrategy::Cooperative => f.write_str("cooperative"),
            TimeoutStrategy::Aggressive => f.write_str("aggressive"),
        }
    }
}

/// Passed to the operation on every execution
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// Cancelled when this execution times out or `inherited` is cancelled.
    pub cancellation: CancellationToken,
    /// The caller's token, if one was supplied.
    pub inherited: Option<CancellationToken>,
}

type TimeoutListener = Arc<dyn Fn() + Send + Sync>;

/// Executes operations under a time budget
pub struct TimeoutPolicy {
    duration: Duration,
    strategy: TimeoutStrategy,
    unref: bool,
    abandon_on_parent_cancel: bool,
    executions: AtomicU64,
    timeout_listeners: Mutex<Vec<TimeoutListener>>,
}

/// How the aggressive race was decided
enum Settlement<R> {
    Completed(R),
    Panicked(Box<dyn Any + Send>),
    TimedOut,
    ParentCancelled,
}

impl TimeoutPolicy {
    pub fn new(duration: Duration, strategy: TimeoutStrategy) -> Self {
        Self {
            duration,
            strategy,
            unref: false,
            abandon_on_parent_cancel: false,
            executions: AtomicU64::new(0),
            timeout_listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn from_millis(millis: u64, strategy: TimeoutStrategy) -> Self {
        Self::new(Duration::from_millis(millis), strategy)
    }

    /// Arm unreferenced timers from now on.
    ///
    /// A pending timeout will no longer keep the event loop alive, so an
    /// operation that never settles can be silently left behind when the
    /// loop runs out of other work. Fails with [`Error::PolicyInUse`] once
    /// the policy has executed.
    pub fn dangerously_unref(mut self) -> Result<Self> {
        self.ensure_unused()?;
        self.unref = true;
        Ok(self)
    }

    /// Also abandon aggressive executions when the caller's token is cancelled.
    ///
    /// By default an inherited cancellation only flips the operation's token;
    /// the policy keeps waiting for its own timer. Fails with
    /// [`Error::PolicyInUse`] once the policy has executed.
    pub fn abandon_on_parent_cancel(mut self) -> Result<Self> {
        self.ensure_unused()?;
        self.abandon_on_parent_cancel = true;
        Ok(self)
    }

    /// Register a callback that runs each time this policy's own timer fires
    pub fn on_timeout<F>(&self, listener: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.timeout_listeners.lock().push(Arc::new(listener));
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn strategy(&self) -> TimeoutStrategy {
        self.strategy
    }

    pub fn is_unref(&self) -> bool {
        self.unref
    }

    /// Number of executions started so far
    pub fn executions(&self) -> u64 {
        self.executions.load(Ordering::SeqCst)
    }

    /// Execute an infallible operation under this policy.
    ///
    /// Resolves to the operation's value, or to [`TaskCancelledError`] when
    /// an aggressive timeout abandons it.
    ///
    /// # Panics
    ///
    /// Panics if polled outside of a runtime.
    pub async fn execute<F, Fut, T>(
        &self,
        operation: F,
        parent: Option<&CancellationToken>,
    ) -> std::result::Result<T, TaskCancelledError>
    where
        F: FnOnce(ExecutionContext, CancellationToken) -> Fut,
        Fut: Future<Output = T> + 'static,
        T: 'static,
    {
        self.try_execute(
            move |context, token| operation(context, token).map(Ok::<T, TaskCancelledError>),
            parent,
        )
        .await
    }

    /// Execute a fallible operation under this policy.
    ///
    /// Errors raised by the operation are returned unchanged; an aggressive
    /// timeout is reported as `E::from(TaskCancelledError)`.
    ///
    /// # Panics
    ///
    /// Panics if polled outside of a runtime.
    pub async fn try_execute<F, Fut, T, E>(
        &self,
        operation: F,
        parent: Option<&CancellationToken>,
    ) -> std::result::Result<T, E>
    where
        F: FnOnce(ExecutionContext, CancellationToken) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>> + 'static,
        T: 'static,
        E: From<TaskCancelledError> + 'static,
    {
        let execution = self.executions.fetch_add(1, Ordering::SeqCst) + 1;
        let handle = Handle::current();

        let source = Rc::new(match parent {
            Some(parent) => CancellationTokenSource::with_parent(parent),
            None => CancellationTokenSource::new(),
        });
        let token = source.token().clone();
        let context = ExecutionContext {
            cancellation: token.clone(),
            inherited: parent.cloned(),
        };

        tracing::debug!(
            execution,
            strategy = %self.strategy,
            duration = ?self.duration,
            inherited = parent.is_some(),
            "executing under timeout"
        );

        match self.strategy {
            TimeoutStrategy::Cooperative => {
                let _timer = self.arm(&handle, source, || true, || {});
                operation(context, token).await
            }
            TimeoutStrategy::Aggressive => {
                let (settled, promise) = defer::<Settlement<std::result::Result<T, E>>>();

                // The operation may settle in the same turn the deadline passes,
                // before this future gets to drop the timer.
                let race = promise.clone();
                let on_elapsed = promise.clone();
                let _timer = self.arm(
                    &handle,
                    source,
                    move || !race.is_settled(),
                    move || {
                        on_elapsed.complete(Settlement::TimedOut);
                    },
                );

                let operation = AssertUnwindSafe(operation(context, token)).catch_unwind();
                let _detached = handle.spawn(async move {
                    let settlement = match operation.await {
                        Ok(result) => Settlement::Completed(result),
                        Err(payload) => Settlement::Panicked(payload),
                    };
                    let panicked = matches!(settlement, Settlement::Panicked(_));
                    if !promise.complete(settlement) {
                        if panicked {
                            tracing::error!(execution, "abandoned operation panicked");
                        } else {
                            tracing::debug!(
                                execution,
                                "abandoned operation settled, outcome discarded"
                            );
                        }
                    }
                });

                let mut settled = settled;
                let mut parent_cancelled = match parent {
                    Some(parent) if self.abandon_on_parent_cancel => Some(parent.cancelled()),
                    _ => None,
                };
                let settlement = futures::future::poll_fn(|cx| {
                    if let Poll::Ready(settlement) = Pin::new(&mut settled).poll(cx) {
                        return Poll::Ready(settlement);
                    }
                    match parent_cancelled.as_mut() {
                        Some(cancelled) => match Pin::new(cancelled).poll(cx) {
                            Poll::Ready(()) => Poll::Ready(Settlement::ParentCancelled),
                            Poll::Pending => Poll::Pending,
                        },
                        None => Poll::Pending,
                    }
                })
                .await;

                match settlement {
                    Settlement::Completed(result) => result,
                    Settlement::Panicked(payload) => std::panic::resume_unwind(payload),
                    Settlement::TimedOut => {
                        tracing::debug!(execution, "operation abandoned after timeout");
                        Err(TaskCancelledError.into())
                    }
                    Settlement::ParentCancelled => {
                        tracing::debug!(
                            execution,
                            "operation abandoned after inherited cancellation"
                        );
                        Err(TaskCancelledError.into())
                    }
                }
            }
        }
    }

    fn ensure_unused(&self) -> Result<()> {
        if self.executions() > 0 {
            return Err(Error::PolicyInUse);
        }
        Ok(())
    }

    fn timer_mode(&self) -> TimerMode {
        if self.unref {
            TimerMode::Unreferenced
        } else {
            TimerMode::Referenced
        }
    }

    /// Arm this execution's timer: cancel `source`, notify listeners, then run `then`.
    ///
    /// Nothing happens on fire if `pending` reports the execution already settled.
    fn arm<P, F>(
        &self,
        handle: &Handle,
        source: Rc<CancellationTokenSource>,
        pending: P,
        then: F,
    ) -> ScopedTimer<Handle>
    where
        P: FnOnce() -> bool + 'static,
        F: FnOnce() + 'static,
    {
        let listeners = self.timeout_listeners.lock().clone();
        let duration = self.duration;

        ScopedTimer::arm(handle.clone(), self.duration, self.timer_mode(), move || {
            if !pending() {
                tracing::trace!(?duration, "timer fired after the execution settled");
                return;
            }
            tracing::debug!(?duration, "timeout elapsed");
            source.cancel();
            for listener in &listeners {
                listener();
            }
            then();
        })
    }
}

impl fmt::Debug for TimeoutPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimeoutPolicy")
            .field("duration", &self.duration)
            .field("strategy", &self.strategy)
            .field("unref", &self.unref)
            .field("abandon_on_parent_cancel", &self.abandon_on_parent_cancel)
            .field("executions", &self.executions())
            .finish()
    }
}
