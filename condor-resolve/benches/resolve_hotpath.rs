use condor_core::Resolver;
use condor_resolve::{DependencyRegistry, Manager, ResolutionEngine};
use condor_test_utils::fixtures::{self, node_key, run};
use condor_test_utils::CallCounter;
use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use std::hint::black_box;

fn bench_memoized_get(c: &mut Criterion) {
    let scenario = fixtures::area_scenario();
    let registry =
        DependencyRegistry::from_dependencies(scenario.dependencies).expect("build registry");
    let mut engine =
        ResolutionEngine::new(&registry, &scenario.pool, run(10, 20)).expect("build engine");
    engine.get(scenario.area).expect("warm area");

    c.bench_function("resolve/memoized_get", |b| {
        b.iter(|| {
            let value = engine.get(black_box(scenario.area)).expect("cached area");
            black_box(value);
        });
    });
}

fn bench_cold_chain(c: &mut Criterion) {
    let calls = CallCounter::new();
    let (deps, pool) = fixtures::chain(256, &calls);
    let registry = DependencyRegistry::from_dependencies(deps).expect("build registry");

    c.bench_function("resolve/cold_chain_256", |b| {
        b.iter_batched(
            || ResolutionEngine::new(&registry, &pool, run(0, 10)).expect("build engine"),
            |mut engine| {
                let top = engine.get(node_key(256)).expect("chain resolves");
                black_box(top);
            },
            BatchSize::SmallInput,
        );
    });
}

fn bench_bulk_windows(c: &mut Criterion) {
    let calls = CallCounter::new();
    let (deps, pool) = fixtures::dag(
        &[vec![], vec![0], vec![0], vec![1, 2], vec![3], vec![3, 4], vec![0, 5]],
        &calls,
    );
    let manager = Manager::default();
    manager.register_all(deps).expect("register graph");
    manager.publish_pool(pool).expect("publish pool");
    let targets: Vec<_> = (0..64).map(|i| run(i * 10, i * 10 + 10)).collect();

    c.bench_function("resolve/bulk_64_windows", |b| {
        b.iter(|| {
            let reports = manager.resolve_windows(black_box(&targets), None);
            black_box(reports.len());
        });
    });
}

criterion_group!(benches, bench_memoized_get, bench_cold_chain, bench_bulk_windows);
criterion_main!(benches);
