//! Performance benchmarks for the state container.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::mpsc;
use unistate::{ContainerConfig, StateContainer};

#[derive(Clone, Debug, PartialEq)]
struct Counter {
    value: u64,
}

fn settle(container: &StateContainer<Counter>) {
    let (tx, rx) = mpsc::channel();
    container
        .snapshot(move |_| {
            let _ = tx.send(());
        })
        .unwrap();
    rx.recv().unwrap();
}

/// Benchmark raw mutation throughput at varying batch sizes.
fn bench_mutation_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("mutation_throughput");

    for batch in [10u64, 100, 1000] {
        group.bench_with_input(BenchmarkId::new("batch", batch), &batch, |b, &batch| {
            let container: StateContainer<Counter> = StateContainer::new(Counter { value: 0 });

            b.iter(|| {
                for _ in 0..batch {
                    container
                        .mutate(|s| Counter { value: s.value + 1 })
                        .unwrap();
                }
                settle(&container);
            });

            black_box(&container);
        });
    }

    group.finish();
}

/// Benchmark commit fan-out with varying subscriber counts.
fn bench_subscriber_fanout(c: &mut Criterion) {
    let mut group = c.benchmark_group("subscriber_fanout");

    for subscribers in [1usize, 8, 64] {
        group.bench_with_input(
            BenchmarkId::new("subscribers", subscribers),
            &subscribers,
            |b, &count| {
                let container: StateContainer<Counter> =
                    StateContainer::builder(Counter { value: 0 })
                        .config(ContainerConfig {
                            state_buffer: 1,
                            ..Default::default()
                        })
                        .build();
                let subs: Vec<_> = (0..count)
                    .map(|_| container.subscribe_state().unwrap())
                    .collect();

                b.iter(|| {
                    for _ in 0..100 {
                        container
                            .mutate(|s| Counter { value: s.value + 1 })
                            .unwrap();
                    }
                    settle(&container);
                });

                black_box(subs);
            },
        );
    }

    group.finish();
}

/// Benchmark middleware pipeline depth.
fn bench_middleware_depth(c: &mut Criterion) {
    let mut group = c.benchmark_group("middleware_depth");

    for depth in [0usize, 4, 16] {
        group.bench_with_input(BenchmarkId::new("depth", depth), &depth, |b, &depth| {
            let mut builder = StateContainer::<Counter>::builder(Counter { value: 0 });
            for _ in 0..depth {
                builder = builder.middleware(|s: Counter| s);
            }
            let container = builder.build();

            b.iter(|| {
                for _ in 0..100 {
                    container
                        .mutate(|s| Counter { value: s.value + 1 })
                        .unwrap();
                }
                settle(&container);
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_mutation_throughput,
    bench_subscriber_fanout,
    bench_middleware_depth
);
criterion_main!(benches);
