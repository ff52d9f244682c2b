//! Benchmarks for plan computation and bounded execution.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use renderflow::executor::{execute_with_concurrency, ConcurrencyLimit};
use renderflow::graph::ExecutionPlan;
use renderflow::step::Step;
use std::collections::HashSet;

fn deep_chain(depth: usize) -> Vec<Step> {
    let mut steps = vec![Step::generate("gen", "v0")];
    for i in 1..depth {
        steps.push(Step::transform("xform", format!("v{}", i - 1), format!("v{i}")));
    }
    steps
}

fn wide_pipeline(width: usize) -> Vec<Step> {
    (0..width)
        .map(|i| Step::generate("gen", format!("v{i}")))
        .collect()
}

fn planning_benchmark(c: &mut Criterion) {
    let deep = deep_chain(64);
    let wide = wide_pipeline(64);
    let empty = HashSet::new();

    c.bench_function("plan_deep_64", |b| {
        b.iter(|| ExecutionPlan::compute(black_box(&deep), &empty))
    });
    c.bench_function("plan_wide_64", |b| {
        b.iter(|| ExecutionPlan::compute(black_box(&wide), &empty))
    });
}

fn executor_benchmark(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap();

    c.bench_function("execute_256_ready_limit_8", |b| {
        b.iter(|| {
            runtime.block_on(async {
                let tasks: Vec<_> = (0..256)
                    .map(|i| async move { Ok::<usize, String>(i) })
                    .collect();
                execute_with_concurrency(tasks, ConcurrencyLimit::bounded(8).unwrap()).await
            })
        })
    });
}

criterion_group!(benches, planning_benchmark, executor_benchmark);
criterion_main!(benches);
