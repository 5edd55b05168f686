//! Job queue claiming benchmark
//!
//! Benchmarks the critical path: publish -> pop -> ack. This is the core
//! job-queue throughput metric for the in-memory backend.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tokio::runtime::Runtime;
use uuid::Uuid;

use flowforge_engine::queue::{InMemoryJobQueue, Job, JobQueue, JobType};

fn bench_pop_single(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    let mut group = c.benchmark_group("queue_claiming/single");
    group.throughput(Throughput::Elements(1));

    group.bench_function("publish_then_pop", |b| {
        b.to_async(&rt).iter_custom(|iters| async move {
            let queue = InMemoryJobQueue::new();
            for i in 0..iters {
                queue
                    .publish(Job::new(Uuid::now_v7(), None, JobType::Start, (i % 200) as i32))
                    .await
                    .unwrap();
            }

            let start = Instant::now();
            let mut popped = 0u64;
            while popped < iters {
                if let Some(job) = queue.pop().await.unwrap() {
                    queue.ack(job.message_id).await.unwrap();
                    popped += 1;
                }
            }
            start.elapsed()
        });
    });

    group.finish();
}

fn bench_pop_concurrent(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    let mut group = c.benchmark_group("queue_claiming/concurrent");
    group.sample_size(20);

    for workers in [2, 4, 8] {
        let job_count = 2000u64;
        group.throughput(Throughput::Elements(job_count));
        group.bench_with_input(BenchmarkId::new("workers", workers), &workers, |b, &workers| {
            b.to_async(&rt).iter(|| async {
                let queue = Arc::new(InMemoryJobQueue::new());
                for i in 0..job_count {
                    queue
                        .publish(Job::new(Uuid::now_v7(), None, JobType::Start, (i % 200) as i32))
                        .await
                        .unwrap();
                }

                let popped_total = Arc::new(AtomicU64::new(0));
                let mut handles = Vec::new();
                for _ in 0..workers {
                    let queue = queue.clone();
                    let popped_total = popped_total.clone();
                    handles.push(tokio::spawn(async move {
                        loop {
                            if popped_total.load(Ordering::Relaxed) >= job_count {
                                break;
                            }
                            match queue.pop().await.unwrap() {
                                Some(job) => {
                                    queue.ack(job.message_id).await.unwrap();
                                    popped_total.fetch_add(1, Ordering::Relaxed);
                                }
                                None => tokio::task::yield_now().await,
                            }
                        }
                    }));
                }
                for handle in handles {
                    handle.await.unwrap();
                }
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_pop_single, bench_pop_concurrent);
criterion_main!(benches);
