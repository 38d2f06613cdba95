//! Report execution benchmarks over generated sample data.
//!
//! Covers one report per computation shape plus the store build itself.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;

use pizza_reports::database::SampleData;
use pizza_reports::query::QueryExecutor;
use pizza_reports::store::{MemoryStore, SqlRenderer};
use pizza_reports::types::Params;

const REPORTS: &[&str] = &[
    "total_revenue",
    "top_pizzas_by_quantity",
    "avg_pizzas_per_day",
    "category_revenue_share",
    "cumulative_revenue",
    "top_pizzas_per_category",
];

fn params_for(id: &str) -> Params {
    match id {
        "top_pizzas_by_quantity" | "top_pizzas_per_category" => Params::new().with("top_n", 3),
        _ => Params::new(),
    }
}

fn bench_store_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_build");
    for orders in [1_000usize, 10_000] {
        let dataset = SampleData::new(42).generate(orders);
        group.bench_with_input(BenchmarkId::from_parameter(orders), &dataset, |b, dataset| {
            b.iter(|| MemoryStore::new(black_box(dataset)).expect("valid sample"))
        });
    }
    group.finish();
}

fn bench_reports(c: &mut Criterion) {
    let dataset = SampleData::new(42).generate(10_000);
    let store = MemoryStore::new(&dataset).expect("valid sample");
    let executor = QueryExecutor::new();

    let mut group = c.benchmark_group("execute");
    for id in REPORTS {
        let params = params_for(id);
        group.bench_function(*id, |b| {
            b.iter(|| {
                executor
                    .execute(black_box(id), black_box(&params), &store)
                    .expect("report runs")
            })
        });
    }
    group.finish();
}

fn bench_render_sql(c: &mut Criterion) {
    let executor = QueryExecutor::new();
    let renderer = SqlRenderer::new();
    let request = executor
        .explain(
            "top_pizzas_per_category",
            &params_for("top_pizzas_per_category"),
        )
        .expect("report plans");

    c.bench_function("render_sql/top_pizzas_per_category", |b| {
        b.iter(|| renderer.render(black_box(&request)))
    });
}

criterion_group!(benches, bench_store_build, bench_reports, bench_render_sql);
criterion_main!(benches);
