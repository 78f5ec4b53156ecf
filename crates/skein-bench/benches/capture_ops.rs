//! Criterion micro-benchmarks for the capture hot path.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use skein_bench::{reference_profile, ring_profile};
use skein_core::{Arg, CaptureMode};
use skein_engine::TraceLog;
use skein_filter::CategoryFilter;

fn bench_category_lookup(c: &mut Criterion) {
    let log = TraceLog::new(reference_profile()).unwrap();
    for i in 0..64 {
        log.category(&format!("warm{i}"));
    }
    c.bench_function("category_lookup_hit", |b| {
        b.iter(|| black_box(log.category(black_box("warm63"))));
    });
}

fn bench_disabled_event(c: &mut Criterion) {
    let log = TraceLog::new(reference_profile()).unwrap();
    let cat = log.category("quiet");
    c.bench_function("add_event_disabled", |b| {
        b.iter(|| black_box(log.add_instant_event(cat, "tick", [])));
    });
}

fn bench_shared_chunk(c: &mut Criterion) {
    let log = TraceLog::new(ring_profile()).unwrap();
    log.enable(CategoryFilter::record_all(), CaptureMode::Recording);
    let cat = log.category("hot");
    c.bench_function("add_event_shared_chunk", |b| {
        b.iter(|| black_box(log.add_instant_event(cat, "tick", [Arg::new("n", 1i64)])));
    });
}

fn bench_registered_thread(c: &mut Criterion) {
    let log = TraceLog::new(ring_profile()).unwrap();
    log.enable(CategoryFilter::record_all(), CaptureMode::Recording);
    log.register_current_thread("bench");
    let cat = log.category("hot");
    c.bench_function("add_event_thread_cache", |b| {
        b.iter(|| black_box(log.add_instant_event(cat, "tick", [Arg::new("n", 1i64)])));
    });
    log.unregister_current_thread();
}

fn bench_begin_end(c: &mut Criterion) {
    let log = TraceLog::new(ring_profile()).unwrap();
    log.enable(CategoryFilter::record_all(), CaptureMode::Recording);
    log.register_current_thread("bench");
    let cat = log.category("slice");
    c.bench_function("begin_end_thread_cache", |b| {
        b.iter(|| {
            if let Some(h) = log.begin_event(cat, "work", None, []) {
                black_box(log.end_event(cat, "work", h));
            }
        });
    });
    log.unregister_current_thread();
}

criterion_group!(
    benches,
    bench_category_lookup,
    bench_disabled_event,
    bench_shared_chunk,
    bench_registered_thread,
    bench_begin_end
);
criterion_main!(benches);
