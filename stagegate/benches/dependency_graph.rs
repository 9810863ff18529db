use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use stagegate::prelude::*;
use std::sync::Arc;

// =============================================================================
// Graph Shapes
// =============================================================================

/// Leaf/spine fabric: every leaf configures after every spine is healthy
fn fabric(spines: usize, leaves: usize) -> DependencyManager {
    let mut manager = DependencyManager::new();
    for s in 0..spines {
        manager.register_node(format!("spine{s}")).unwrap();
    }
    for l in 0..leaves {
        let leaf = format!("leaf{l}");
        manager.register_node(&leaf).unwrap();
        for s in 0..spines {
            manager
                .add_dependency(&leaf, Phase::Configure, &format!("spine{s}"), Phase::Healthy)
                .unwrap();
        }
    }
    manager
}

/// Single chain on the create phase, the worst case for leaf pruning rounds
fn chain(len: usize) -> DependencyManager {
    let mut manager = DependencyManager::new();
    for i in 0..len {
        manager.register_node(format!("n{i}")).unwrap();
    }
    for i in 1..len {
        manager
            .add_dependency(&format!("n{i}"), Phase::Create, &format!("n{}", i - 1), Phase::Create)
            .unwrap();
    }
    manager
}

// =============================================================================
// Benchmarks
// =============================================================================

fn bench_check_acyclicity(c: &mut Criterion) {
    let mut group = c.benchmark_group("check_acyclicity");

    for leaves in [16, 64, 256] {
        let manager = fabric(4, leaves);
        group.bench_with_input(BenchmarkId::new("fabric", leaves), &manager, |b, m| {
            b.iter(|| black_box(m.check_acyclicity()).unwrap())
        });
    }

    for len in [16, 64, 256] {
        let manager = chain(len);
        group.bench_with_input(BenchmarkId::new("chain", len), &manager, |b, m| {
            b.iter(|| black_box(m.check_acyclicity()).unwrap())
        });
    }

    group.finish();
}

fn bench_fan_in_release(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("fan_in_release");

    for leaves in [16, 256] {
        group.bench_function(BenchmarkId::from_parameter(leaves), |b| {
            b.to_async(&rt).iter(|| async move {
                let scheduler = Arc::new(fabric(1, leaves).freeze().unwrap());

                let waiters: Vec<_> = (0..leaves)
                    .map(|l| {
                        let scheduler = Arc::clone(&scheduler);
                        tokio::spawn(async move {
                            scheduler
                                .enter(&format!("leaf{l}"), Phase::Configure)
                                .await
                                .unwrap()
                        })
                    })
                    .collect();

                scheduler.signal_done("spine0", Phase::Healthy);
                for waiter in waiters {
                    black_box(waiter.await.unwrap());
                }
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_check_acyclicity, bench_fan_in_release);
criterion_main!(benches);
