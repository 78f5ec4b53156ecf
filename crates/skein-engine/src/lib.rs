//! Trace log engine for Skein.
//!
//! Provides [`TraceLog`], the context object that owns a category
//! registry, the active chunk store and the per-thread caches writing
//! into it, and coordinates flushes that retire the store and serialize
//! its events through an [`EventFormatter`](skein_core::EventFormatter)
//! into a [`DrainSink`](skein_core::DrainSink).

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

mod capture;
pub mod config;
mod drain;
pub mod flush;
pub mod format;
pub mod generation;
pub mod log;
pub mod metrics;
pub mod observer;
pub mod registry;
mod thread;

pub use config::{ConfigError, TraceLogConfig};
pub use flush::{FlushError, FlushHandle, FlushReport, LateThread};
pub use format::JsonFormatter;
pub use generation::GenerationCounter;
pub use log::{EnableReport, TraceLog};
pub use metrics::TraceMetrics;
pub use observer::{ArgumentPredicate, EnabledStateObserver, EventCallback, EventExporter};
pub use registry::{
    CategoryRef, CategoryRegistry, BUILTIN_CATEGORIES, CATEGORIES_EXHAUSTED, METADATA_CATEGORY,
    TOPLEVEL_CATEGORY,
};
