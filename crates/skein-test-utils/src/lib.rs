//! Test fixtures and mock collaborators for Skein development.
//!
//! Provides a [`CollectingSink`] that records drained fragments, a
//! [`NameFormatter`] that serializes events as their bare names so
//! drained output is easy to assert on, a [`ManualClock`], and small
//! filter constructors.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use skein_core::{Clock, DrainSink, EventFormatter, EventRecord, FormatContext};
use skein_filter::CategoryFilter;

// ── Sinks ──────────────────────────────────────────────────────────

/// Sink that appends every fragment to a shared list.
///
/// Clones share the list, so one clone can be handed to a flush (even a
/// background one) while the test keeps another to inspect.
#[derive(Clone, Default)]
pub struct CollectingSink {
    fragments: Arc<Mutex<Vec<(String, bool)>>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `(fragment, has_more)` pair received so far.
    pub fn fragments(&self) -> Vec<(String, bool)> {
        self.fragments
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of sink calls.
    pub fn calls(&self) -> usize {
        self.fragments
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Non-empty fragments joined with commas.
    pub fn joined(&self) -> String {
        self.fragments()
            .into_iter()
            .map(|(f, _)| f)
            .filter(|f| !f.is_empty())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Items of the joined output. With [`NameFormatter`] these are the
    /// event names in drain order.
    pub fn items(&self) -> Vec<String> {
        let joined = self.joined();
        if joined.is_empty() {
            return Vec::new();
        }
        joined.split(',').map(str::to_string).collect()
    }

    /// Whether the last call carried `has_more == false`.
    pub fn finished(&self) -> bool {
        self.fragments()
            .last()
            .is_some_and(|(_, has_more)| !has_more)
    }
}

impl DrainSink for CollectingSink {
    fn write_fragment(&mut self, fragment: &str, has_more: bool) {
        self.fragments
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((fragment.to_string(), has_more));
    }
}

// ── Formatters ─────────────────────────────────────────────────────

/// Formatter writing only the event name.
///
/// Event names used with it must not contain commas.
#[derive(Clone, Copy, Debug, Default)]
pub struct NameFormatter;

impl EventFormatter for NameFormatter {
    fn format_event(&self, event: &EventRecord, _ctx: &FormatContext<'_>, out: &mut String) {
        out.push_str(&event.name);
    }
}

// ── Clocks ─────────────────────────────────────────────────────────

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
    thread_now: AtomicU64,
}

impl ManualClock {
    pub fn new(start_ns: u64) -> Self {
        Self {
            now: AtomicU64::new(start_ns),
            thread_now: AtomicU64::new(0),
        }
    }

    pub fn set(&self, ns: u64) {
        self.now.store(ns, Ordering::Relaxed);
    }

    pub fn advance(&self, ns: u64) {
        self.now.fetch_add(ns, Ordering::Relaxed);
        self.thread_now.fetch_add(ns, Ordering::Relaxed);
    }
}

impl Clock for ManualClock {
    fn now_ns(&self) -> u64 {
        self.now.load(Ordering::Relaxed)
    }

    fn thread_now_ns(&self) -> Option<u64> {
        Some(self.thread_now.load(Ordering::Relaxed))
    }
}

// ── Filters ────────────────────────────────────────────────────────

/// Filter including exactly `patterns`.
pub fn include_only(patterns: &[&str]) -> CategoryFilter {
    patterns
        .iter()
        .fold(CategoryFilter::builder(), |b, p| b.include(*p))
        .build()
}

/// Filter recording everything except `patterns`.
pub fn exclude(patterns: &[&str]) -> CategoryFilter {
    patterns
        .iter()
        .fold(CategoryFilter::builder(), |b, p| b.exclude(*p))
        .build()
}
