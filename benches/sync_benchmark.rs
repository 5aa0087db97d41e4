/*!
 * Synchronization Primitives Benchmarks
 *
 * Wait fast path, wake latency across configurations, pool handout and
 * uncontended slot acquisition
 */

use adaptive_sync::core::sync::WaitHandlePool;
use adaptive_sync::{AdaptiveWaiter, NoopHooks, RingCursor, SlotAcquirer, SyncConfig};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn bench_wait_fast_path(c: &mut Criterion) {
    let waiter = AdaptiveWaiter::new(SyncConfig::default()).unwrap();
    let word = AtomicU32::new(1);

    c.bench_function("wait_fast_path", |b| {
        b.iter(|| black_box(waiter.wait(&word, black_box(0), Duration::from_millis(1))))
    });
}

fn bench_wake_latency(c: &mut Criterion) {
    let mut group = c.benchmark_group("wake_latency");

    for (name, config) in [
        ("default", SyncConfig::default()),
        ("low_latency", SyncConfig::low_latency()),
        ("power_saving", SyncConfig::power_saving()),
    ] {
        group.bench_with_input(BenchmarkId::from_parameter(name), &config, |b, config| {
            let waiter = Arc::new(AdaptiveWaiter::new(config.clone()).unwrap());
            b.iter(|| {
                let word = Arc::new(AtomicU32::new(0));
                let setter = {
                    let word = word.clone();
                    let waiter = waiter.clone();
                    thread::spawn(move || {
                        word.store(1, Ordering::Release);
                        waiter.notify();
                    })
                };

                while !waiter.wait(&*word, 0, Duration::from_millis(1)) {}
                setter.join().unwrap();
            });
        });
    }

    group.finish();
}

fn bench_pool_acquire(c: &mut Criterion) {
    let pool = WaitHandlePool::new();

    c.bench_function("pool_acquire", |b| {
        b.iter(|| black_box(pool.acquire().index()))
    });
}

fn bench_acquire_uncontended(c: &mut Criterion) {
    let waiter = Arc::new(AdaptiveWaiter::new(SyncConfig::default()).unwrap());
    let acquirer = SlotAcquirer::new(waiter, NoopHooks);
    let ring = RingCursor::new();

    c.bench_function("acquire_uncontended", |b| {
        b.iter(|| {
            // Single reference: the acquirer consumes the slot and catches up
            let slot = ring.arm_slot(0, 1, 1).unwrap();
            acquirer.offer(&ring, slot).unwrap();
            black_box(acquirer.acquire(&ring, false, false))
        })
    });
}

criterion_group!(
    benches,
    bench_wait_fast_path,
    bench_wake_latency,
    bench_pool_acquire,
    bench_acquire_uncontended,
);
criterion_main!(benches);
