//! Cancellation token graph: ordering, idempotence and cross-executor use

mod common;

use proptest::collection::vec;
use proptest::prelude::*;
use rust_cutoff::{CancellableFutureExt, CancellationTokenSource, TaskCancelledError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

proptest! {
    #[test]
    fn listeners_fire_once_in_registration_order(listeners in 0usize..16, cancels in 1usize..8) {
        let source = CancellationTokenSource::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let registrations: Vec<_> = (0..listeners)
            .map(|i| {
                let log = log.clone();
                source.token().on_cancelled(move || log.lock().unwrap().push(i))
            })
            .collect();

        for _ in 0..cancels {
            source.cancel();
        }

        prop_assert_eq!(log.lock().unwrap().clone(), (0..listeners).collect::<Vec<_>>());
        prop_assert_eq!(source.token().listener_count(), 0);
        drop(registrations);
    }

    #[test]
    fn disposed_listeners_never_fire(keep in vec(any::<bool>(), 0..16)) {
        let source = CancellationTokenSource::new();
        let fired = Arc::new(Mutex::new(Vec::new()));

        let mut kept = Vec::new();
        for (i, keep_it) in keep.iter().enumerate() {
            let fired = fired.clone();
            let registration = source.token().on_cancelled(move || fired.lock().unwrap().push(i));
            if *keep_it {
                kept.push(registration);
            } else {
                prop_assert!(registration.dispose());
            }
        }

        source.cancel();

        let expected: Vec<usize> = keep
            .iter()
            .enumerate()
            .filter(|(_, keep_it)| **keep_it)
            .map(|(i, _)| i)
            .collect();
        prop_assert_eq!(fired.lock().unwrap().clone(), expected);
        drop(kept);
    }

    #[test]
    fn cancellation_propagates_down_any_chain(depth in 1usize..12, cut in 0usize..12) {
        let cut = cut % depth;
        let mut chain = vec![CancellationTokenSource::new()];
        for _ in 1..depth {
            let child = CancellationTokenSource::with_parent(chain.last().unwrap().token());
            chain.push(child);
        }

        chain[cut].cancel();

        for (level, source) in chain.iter().enumerate() {
            prop_assert_eq!(source.token().is_cancellation_requested(), level >= cut);
        }
    }
}

#[test]
fn late_listener_runs_immediately() {
    common::setup_tracing();
    let source = CancellationTokenSource::new();
    source.cancel();

    let fired = Arc::new(AtomicUsize::new(0));
    let counter = fired.clone();
    let registration = source.token().on_cancelled(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    assert_eq!(fired.load(Ordering::SeqCst), 1);
    source.cancel();
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert!(!registration.dispose());
}

#[test]
fn listener_may_register_on_its_own_token() {
    common::setup_tracing();
    let source = CancellationTokenSource::new();
    let token = source.token().clone();
    let fired = Arc::new(AtomicUsize::new(0));

    let counter = fired.clone();
    let _registration = source.token().on_cancelled(move || {
        let counter = counter.clone();
        token
            .on_cancelled(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .forget();
    });

    source.cancel();
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn token_wakes_tokio_task() {
    common::setup_tracing();
    let source = CancellationTokenSource::new();
    let token = source.token().clone();

    let waiter = tokio::spawn(async move { token.cancelled().await });
    tokio::time::sleep(Duration::from_millis(5)).await;
    source.cancel();

    tokio::time::timeout(Duration::from_secs(1), waiter)
        .await
        .expect("waiter should observe cancellation")
        .unwrap();
}

#[tokio::test]
async fn cancellable_future_on_tokio() {
    common::setup_tracing();
    let source = CancellationTokenSource::new();

    let work = tokio::time::sleep(Duration::from_secs(60)).cancellable(source.token());
    let canceller = async {
        tokio::time::sleep(Duration::from_millis(5)).await;
        source.cancel();
    };

    let (result, ()) = tokio::join!(work, canceller);
    assert_eq!(result, Err(TaskCancelledError));
}
