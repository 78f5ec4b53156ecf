//! Skein: low-overhead trace-event capture.
//!
//! This is the top-level facade crate that re-exports the public API from all
//! Skein sub-crates. For most users, adding `skein` as a single dependency is
//! sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use skein::prelude::*;
//!
//! let log = TraceLog::new(TraceLogConfig::default()).unwrap();
//! let gpu = log.category("gpu");
//!
//! log.enable(CategoryFilter::record_all(), CaptureMode::Recording);
//! if let Some(handle) = log.begin_event(gpu, "draw", None, [Arg::new("frame", 1i64)]) {
//!     log.end_event(gpu, "draw", handle);
//! }
//! log.disable();
//!
//! let mut json = String::from("[");
//! let report = log
//!     .flush(
//!         move |fragment: &str, has_more: bool| {
//!             json.push_str(fragment);
//!             if !has_more {
//!                 json.push(']');
//!             }
//!         },
//!         false,
//!     )
//!     .unwrap()
//!     .wait()
//!     .unwrap();
//! assert!(report.events >= 1);
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate. Use them for types not in the prelude:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `skein-core` | IDs, event records, flags, modes, collaborator traits |
//! | [`filter`] | `skein-filter` | Category filters and merging |
//! | [`arena`] | `skein-arena` | Chunks and chunk stores |
//! | [`engine`] | `skein-engine` | The trace log, flushing and JSON output |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types, traits, and IDs (`skein-core`).
///
/// Contains [`types::EventRecord`], [`types::EventBuilder`], the
/// [`types::EventHandle`] address, flag bitsets, and the collaborator
/// traits ([`types::EventFormatter`], [`types::DrainSink`], [`types::Clock`]).
pub use skein_core as types;

/// Category-group filtering (`skein-filter`).
///
/// [`filter::CategoryFilter`] decides which category groups a session
/// records and how two sessions' filters merge.
pub use skein_filter as filter;

/// Chunk storage (`skein-arena`).
///
/// [`arena::RingStore`] and [`arena::GrowStore`] behind the
/// [`arena::ChunkStore`] trait, sized by [`arena::StoreConfig`].
pub use skein_arena as arena;

/// The trace log engine (`skein-engine`).
///
/// [`engine::TraceLog`] for capture and session control, plus
/// [`engine::JsonFormatter`] for trace-event JSON output.
pub use skein_engine as engine;

/// Common imports for typical Skein usage.
///
/// ```rust
/// use skein::prelude::*;
/// ```
///
/// This imports the trace log and its configuration, filters, the event
/// vocabulary, and the collaborator traits.
pub mod prelude {
    // Core types and traits
    pub use skein_core::{
        Arg, ArgValue, CaptureMode, CategoryFlags, Clock, DrainSink, EventBuilder, EventFormatter,
        EventHandle, EventRecord, Phase, RecordMode,
    };

    // Filters
    pub use skein_filter::CategoryFilter;

    // Storage
    pub use skein_arena::StoreConfig;

    // Engine
    pub use skein_engine::{
        CategoryRef, EnableReport, EnabledStateObserver, EventExporter, FlushError, FlushReport,
        JsonFormatter, TraceLog, TraceLogConfig, TraceMetrics,
    };
}
