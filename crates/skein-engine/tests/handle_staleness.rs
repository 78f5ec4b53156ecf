//! Handles stop resolving once their chunk is reissued or retired, and
//! closing through a stale handle never touches the chunk now in its
//! slot.

use skein_arena::StoreConfig;
use skein_core::CaptureMode;
use skein_engine::{JsonFormatter, TraceLog, TraceLogConfig};
use skein_filter::CategoryFilter;
use skein_test_utils::CollectingSink;
use std::sync::Arc;

fn ring_log(chunks: usize, capacity: usize) -> TraceLog {
    let log = TraceLog::new(TraceLogConfig {
        store_overrides: Some(StoreConfig::ring(chunks).with_chunk_capacity(capacity)),
        formatter: Arc::new(JsonFormatter::with_pid(1)),
        ..Default::default()
    })
    .unwrap();
    log.enable(CategoryFilter::record_all(), CaptureMode::Recording);
    log
}

#[test]
fn reissued_slot_rejects_old_handle() {
    let log = ring_log(1, 2);
    let cat = log.category("stale");

    let old = log.begin_event(cat, "slice", None, []).unwrap();
    log.add_instant_event(cat, "filler", []).unwrap();
    // Chunk full: the slot is released and reissued under a new sequence.
    let fresh = log.begin_event(cat, "reused", None, []).unwrap();
    assert_eq!(fresh.chunk_index(), old.chunk_index());
    assert_eq!(fresh.event_index(), old.event_index());
    assert_ne!(fresh.chunk_seq(), old.chunk_seq());

    assert!(!log.close_event(old, 1_000_000));
    assert_eq!(log.metrics().stale_closes, 1);

    let sink = CollectingSink::new();
    log.flush_without_retiring(sink.clone());
    let out = sink.joined();
    assert!(out.contains("\"name\":\"reused\""));
    assert!(!out.contains("\"dur\""), "stale close mutated the reissued chunk: {out}");

    assert!(log.close_event(fresh, 1_000_000));
}

#[test]
fn retired_chunk_rejects_handle() {
    let log = ring_log(4, 8);
    log.register_current_thread("main");
    let cat = log.category("stale");
    let handle = log.begin_event(cat, "slice", Some(1), []).unwrap();

    log.disable();
    let sink = CollectingSink::new();
    log.flush(sink.clone(), false).unwrap().wait().unwrap();
    assert!(sink.joined().contains("\"name\":\"slice\""));

    assert!(!log.close_event(handle, 5));
    assert_eq!(log.metrics().stale_closes, 1);
}

#[test]
fn own_cached_chunk_resolves() {
    let log = ring_log(4, 8);
    log.register_current_thread("main");
    let cat = log.category("live");
    let handle = log.begin_event(cat, "slice", None, []).unwrap();
    assert!(log.end_event(cat, "slice", handle));
    assert_eq!(log.metrics().stale_closes, 0);
}

#[test]
fn invalid_handle_never_resolves() {
    let log = ring_log(2, 2);
    let handle = skein_core::EventHandle::new(
        skein_core::ChunkSeq(0),
        0,
        0,
        log.generation(),
    );
    assert!(!log.close_event(handle, 1));
}
