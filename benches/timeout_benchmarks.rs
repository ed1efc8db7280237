use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use rust_cutoff::timer::{TimerAction, TimerMode, TimerQueue};
use rust_cutoff::{CancellationTokenSource, Runtime, TimeoutPolicy, TimeoutStrategy};
use std::sync::Arc;
use std::task::{Wake, Waker};
use std::time::{Duration, Instant};

struct BenchWaker;

impl Wake for BenchWaker {
    fn wake(self: Arc<Self>) {}
}

fn create_bench_waker() -> Waker {
    Arc::new(BenchWaker).into()
}

fn timer_queue_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("timer_queue");
    group.throughput(Throughput::Elements(1));

    group.bench_function("schedule_cancel", |b| {
        let mut queue = TimerQueue::new();
        let now = Instant::now();

        b.iter(|| {
            let id = queue.schedule(
                black_box(now + Duration::from_millis(100)),
                TimerMode::Referenced,
                TimerAction::Wake(create_bench_waker()),
            );
            black_box(queue.cancel(id));
        })
    });

    for batch_size in [10u64, 100, 1000] {
        group.throughput(Throughput::Elements(batch_size));
        group.bench_function(format!("expire_batch_{}", batch_size), |b| {
            b.iter_batched(
                || {
                    let mut queue = TimerQueue::new();
                    let now = Instant::now();
                    for i in 0..batch_size {
                        queue.schedule(
                            now + Duration::from_micros(i),
                            TimerMode::Unreferenced,
                            TimerAction::Wake(create_bench_waker()),
                        );
                    }
                    (queue, now + Duration::from_millis(1))
                },
                |(mut queue, at)| black_box(queue.expire(at)),
                criterion::BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

fn cancellation_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("cancellation");

    for listeners in [1usize, 8, 64] {
        group.throughput(Throughput::Elements(listeners as u64));
        group.bench_function(format!("cancel_with_{}_listeners", listeners), |b| {
            b.iter_batched(
                || {
                    let source = CancellationTokenSource::new();
                    let registrations: Vec<_> = (0..listeners)
                        .map(|_| source.token().on_cancelled(|| {}))
                        .collect();
                    (source, registrations)
                },
                |(source, registrations)| {
                    source.cancel();
                    black_box(registrations);
                },
                criterion::BatchSize::SmallInput,
            )
        });
    }

    group.bench_function("link_and_drop_child", |b| {
        let parent = CancellationTokenSource::new();
        b.iter(|| black_box(CancellationTokenSource::with_parent(parent.token())))
    });

    group.finish();
}

fn policy_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("timeout_policy");
    group.throughput(Throughput::Elements(1));

    for strategy in [TimeoutStrategy::Cooperative, TimeoutStrategy::Aggressive] {
        group.bench_function(format!("execute_immediate_{}", strategy), |b| {
            let runtime = Runtime::new();
            let policy = TimeoutPolicy::from_millis(1000, strategy);
            b.iter(|| {
                let value = runtime.block_on(policy.execute(|_, _| async { 42 }, None));
                black_box(value)
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    timer_queue_benchmark,
    cancellation_benchmark,
    policy_benchmark
);
criterion_main!(benches);
