//! Benchmark profiles for the Skein trace-event engine.
//!
//! Provides pre-built [`TraceLogConfig`] profiles shared by the benches:
//!
//! - [`reference_profile`]: default grow store, JSON output
//! - [`ring_profile`]: small ring store that recycles constantly
//! - [`category_names`]: deterministic category group names

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::sync::Arc;

use skein_arena::StoreConfig;
use skein_engine::{JsonFormatter, TraceLogConfig};

/// Default store sizing with a fixed-pid JSON formatter.
pub fn reference_profile() -> TraceLogConfig {
    TraceLogConfig {
        formatter: Arc::new(JsonFormatter::with_pid(1)),
        ..Default::default()
    }
}

/// A 16-chunk ring, so sustained capture exercises slot reuse.
pub fn ring_profile() -> TraceLogConfig {
    TraceLogConfig {
        store_overrides: Some(StoreConfig::ring(16)),
        ..reference_profile()
    }
}

/// `count` distinct category group names, some of them composite.
pub fn category_names(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| match i % 4 {
            0 => format!("cat{i}"),
            1 => format!("cat{i},shared"),
            2 => format!("disabled-by-default-cat{i}"),
            _ => format!("cat{i}Test"),
        })
        .collect()
}
