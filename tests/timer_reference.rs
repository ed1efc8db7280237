//! Whether a pending timeout keeps the event loop alive
//!
//! `Runtime::run` plays the part of a host process: it returns once nothing
//! referenced is left to wait for.

mod common;

use rust_cutoff::{timeout, CancellationToken, Runtime, TimeoutStrategy};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

#[test]
fn does_not_unref_by_default() {
    common::setup_tracing();
    let runtime = Runtime::new();
    let output = Rc::new(RefCell::new(String::new()));

    let sink = output.clone();
    runtime.spawn(async move {
        let policy = timeout(Duration::from_millis(100), "aggressive".parse().unwrap());
        if let Err(err) = policy
            .execute(|_, _| futures::future::pending::<()>(), None)
            .await
        {
            sink.borrow_mut().push_str(&err.to_string());
        }
    });

    let start = Instant::now();
    runtime.run();

    assert!(start.elapsed() >= Duration::from_millis(100));
    assert!(output.borrow().contains("Operation cancelled"));
    assert_eq!(runtime.pending_timers(), 0);
}

#[test]
fn cooperative_timer_is_referenced_by_default() {
    common::setup_tracing();
    let runtime = Runtime::new();
    let observed: Rc<RefCell<Option<CancellationToken>>> = Rc::new(RefCell::new(None));

    let slot = observed.clone();
    runtime.spawn(async move {
        let policy = timeout(Duration::from_millis(30), TimeoutStrategy::Cooperative);
        let _ = policy
            .execute(
                move |_, token| {
                    *slot.borrow_mut() = Some(token);
                    futures::future::pending::<()>()
                },
                None,
            )
            .await;
    });

    let start = Instant::now();
    runtime.run();

    assert!(start.elapsed() >= Duration::from_millis(30));
    let token = observed.borrow().clone().expect("operation should have started");
    assert!(token.is_cancellation_requested());
}

#[test]
fn unrefs_as_requested() {
    common::setup_tracing();
    let runtime = Runtime::new();
    let output = Rc::new(RefCell::new(String::new()));

    let sink = output.clone();
    runtime.spawn(async move {
        let policy = timeout(Duration::from_secs(60), TimeoutStrategy::Aggressive)
            .dangerously_unref()
            .unwrap();
        if let Err(err) = policy
            .execute(|_, _| futures::future::pending::<()>(), None)
            .await
        {
            sink.borrow_mut().push_str(&err.to_string());
        }
    });

    let start = Instant::now();
    runtime.run();

    assert!(start.elapsed() < Duration::from_secs(5));
    assert!(output.borrow().is_empty());
    assert_eq!(runtime.referenced_timers(), 0);
    assert_eq!(runtime.pending_timers(), 1);
}
