//! Criterion micro-benchmarks for category filter evaluation and merging.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use skein_bench::category_names;
use skein_filter::CategoryFilter;

fn bench_is_enabled(c: &mut Criterion) {
    let filter = CategoryFilter::builder()
        .include("cat1*")
        .include("disabled-by-default-cat2")
        .exclude("*Test")
        .build();
    let names = category_names(256);
    c.bench_function("filter_is_enabled_256", |b| {
        b.iter(|| {
            names
                .iter()
                .filter(|n| filter.is_enabled(black_box(n.as_str())))
                .count()
        });
    });
}

fn bench_merge(c: &mut Criterion) {
    let a = CategoryFilter::builder().include("a").include("b").exclude("c").build();
    let other = CategoryFilter::builder().include("d").exclude("e*").build();
    c.bench_function("filter_merge", |b| {
        b.iter(|| {
            let mut merged = a.clone();
            black_box(merged.merge(black_box(&other)));
            merged
        });
    });
}

criterion_group!(benches, bench_is_enabled, bench_merge);
criterion_main!(benches);
