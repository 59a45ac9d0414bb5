use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use futures::future::join_all;
use std::time::Duration;
use task_throttle::{BoundedDeque, ConcurrencyGate, RateLimiter, Throttle, TokenBucket};

/// Benchmark raw deque churn through a fixed ring
fn bench_deque(c: &mut Criterion) {
    let mut group = c.benchmark_group("deque");
    group.throughput(Throughput::Elements(1000));

    group.bench_function("push_pop_fifo", |b| {
        let mut deque = BoundedDeque::with_capacity(64);
        b.iter(|| {
            for i in 0..1000u32 {
                deque.push_back(black_box(i)).ok();
                if deque.len() > 32 {
                    black_box(deque.pop_front());
                }
            }
            deque.clear();
        })
    });

    group.bench_function("remove_by_node", |b| {
        b.iter(|| {
            let mut deque = BoundedDeque::with_capacity(1000);
            let nodes: Vec<_> = (0..1000u32).filter_map(|i| deque.push_back(i).ok()).collect();
            for node in nodes.into_iter().rev() {
                black_box(deque.remove(node));
            }
        })
    });

    group.finish();
}

/// Benchmark non-blocking admission decisions
fn bench_try_admission(c: &mut Criterion) {
    let mut group = c.benchmark_group("try_admission");
    group.throughput(Throughput::Elements(1000));

    group.bench_function("bucket_try_withdraw", |b| {
        let bucket = TokenBucket::new(1e9, 1e9, Duration::from_secs(1)).unwrap();
        bucket.fill(1e9);
        b.iter(|| {
            for _ in 0..1000 {
                black_box(bucket.try_withdraw(black_box(1.0)).ok());
            }
        })
    });

    group.bench_function("limiter_try_remove", |b| {
        let limiter = RateLimiter::new(1e9, Duration::from_secs(1)).unwrap();
        b.iter(|| {
            for _ in 0..1000 {
                black_box(limiter.try_remove(black_box(1.0)).ok());
            }
        })
    });

    group.bench_function("gate_try_acquire_release", |b| {
        let gate = ConcurrencyGate::new(4).unwrap();
        b.iter(|| {
            for _ in 0..1000 {
                if let Some(slot) = gate.try_acquire() {
                    slot.release();
                }
            }
        })
    });

    group.finish();
}

/// Benchmark end-to-end throttled calls under contention
fn bench_throttle_contention(c: &mut Criterion) {
    let mut group = c.benchmark_group("throttle_contention");
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();

    for concurrency in [1usize, 4, 16] {
        group.throughput(Throughput::Elements(256));
        group.bench_with_input(
            BenchmarkId::new("run_256_jobs", concurrency),
            &concurrency,
            |b, &concurrency| {
                let throttle = Throttle::new(concurrency).unwrap();
                b.iter(|| {
                    runtime.block_on(async {
                        let calls = (0..256u32).map(|i| {
                            throttle.run(move || async move {
                                tokio::task::yield_now().await;
                                i
                            })
                        });
                        black_box(join_all(calls).await);
                    })
                })
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_deque, bench_try_admission, bench_throttle_contention);
criterion_main!(benches);
