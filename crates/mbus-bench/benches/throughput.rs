//! Throughput benchmarks for the bus.
//!
//! These benchmarks measure how fast messages get through the dispatcher and
//! out to subscribers.

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use mbus_bench::{runtime, Fixture};
use mbus_core::{IdGenerator, Message};
use std::time::Instant;

/// Benchmark fan-out to a growing number of subscribers.
fn bench_fan_out(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("fan_out");

    for subscribers in [1usize, 10, 100] {
        group.throughput(Throughput::Elements(subscribers as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(subscribers),
            &subscribers,
            |b, &subscribers| {
                b.iter_custom(|iters| {
                    rt.block_on(async {
                        let mut fixture = Fixture::new("bench", subscribers, 1024).await;
                        let payload = Bytes::from(vec![0u8; 64]);

                        let start = Instant::now();
                        for _ in 0..iters {
                            fixture.bus.publish("bench", payload.clone()).await;
                            for rx in &mut fixture.receivers {
                                black_box(rx.recv().await);
                            }
                        }
                        start.elapsed()
                    })
                });
            },
        );
    }

    group.finish();
}

/// Benchmark publishing with no subscribers (lookup miss).
fn bench_publish_unrouted(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("publish_unrouted");
    group.throughput(Throughput::Elements(1));

    group.bench_function("no_subscribers", |b| {
        b.iter_custom(|iters| {
            rt.block_on(async {
                let fixture = Fixture::new("bench", 0, 1).await;
                let start = Instant::now();
                for i in 0..iters {
                    fixture.bus.publish("nobody", black_box(i)).await;
                }
                start.elapsed()
            })
        });
    });

    group.finish();
}

/// Benchmark message construction and id generation.
fn bench_message_creation(c: &mut Criterion) {
    let mut group = c.benchmark_group("message_creation");
    let ids = IdGenerator::new();

    group.bench_function("simple", |b| {
        b.iter(|| Message::new(black_box("bench:topic"), black_box(vec![0u8; 64])))
    });

    group.bench_function("next_id", |b| b.iter(|| black_box(ids.next())));

    group.finish();
}

criterion_group!(
    benches,
    bench_fan_out,
    bench_publish_unrouted,
    bench_message_creation
);
criterion_main!(benches);
