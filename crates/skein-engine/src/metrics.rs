//! Counters for degraded-but-functioning conditions.
//!
//! [`TraceMetrics`] is a point-in-time copy of the log's counters. None
//! of these conditions is an error: each marks data the engine chose to
//! drop or could not collect, so they are the place to look when a
//! capture is thinner than expected.

use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of a log's counters.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TraceMetrics {
    /// Events written into a chunk.
    pub events_recorded: u64,
    /// Events refused because a grow store was full.
    pub events_dropped_full: u64,
    /// Events dropped because no chunk could be acquired.
    pub events_dropped_no_chunk: u64,
    /// Capture calls made from inside the engine's own bookkeeping.
    pub events_dropped_reentrant: u64,
    /// Cached chunks thrown away because their store was replaced
    /// without a flush collecting them.
    pub chunks_discarded: u64,
    /// `close_event` calls whose handle no longer resolved.
    pub stale_closes: u64,
    /// Flushes that retired a store.
    pub flushes: u64,
    /// Flushes that hit the surrender timeout.
    pub flush_timeouts: u64,
    /// Threads that failed to surrender in time, summed over flushes.
    pub late_threads: u64,
}

#[derive(Default)]
pub(crate) struct MetricCounters {
    pub(crate) events_recorded: AtomicU64,
    pub(crate) events_dropped_full: AtomicU64,
    pub(crate) events_dropped_no_chunk: AtomicU64,
    pub(crate) events_dropped_reentrant: AtomicU64,
    pub(crate) chunks_discarded: AtomicU64,
    pub(crate) stale_closes: AtomicU64,
    pub(crate) flushes: AtomicU64,
    pub(crate) flush_timeouts: AtomicU64,
    pub(crate) late_threads: AtomicU64,
}

impl MetricCounters {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> TraceMetrics {
        let get = |c: &AtomicU64| c.load(Ordering::Relaxed);
        TraceMetrics {
            events_recorded: get(&self.events_recorded),
            events_dropped_full: get(&self.events_dropped_full),
            events_dropped_no_chunk: get(&self.events_dropped_no_chunk),
            events_dropped_reentrant: get(&self.events_dropped_reentrant),
            chunks_discarded: get(&self.chunks_discarded),
            stale_closes: get(&self.stale_closes),
            flushes: get(&self.flushes),
            flush_timeouts: get(&self.flush_timeouts),
            late_threads: get(&self.late_threads),
        }
    }

    pub(crate) fn reset(&self) {
        for c in [
            &self.events_recorded,
            &self.events_dropped_full,
            &self.events_dropped_no_chunk,
            &self.events_dropped_reentrant,
            &self.chunks_discarded,
            &self.stale_closes,
            &self.flushes,
            &self.flush_timeouts,
            &self.late_threads,
        ] {
            c.store(0, Ordering::Relaxed);
        }
    }
}
