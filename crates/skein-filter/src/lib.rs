//! Category-group filtering for Skein.
//!
//! A [`CategoryFilter`] decides, for a comma-joined category group such
//! as `"gpu,disabled-by-default-gpu.debug"`, whether a capture session
//! is interested in it. Filters are built programmatically with
//! [`CategoryFilter::builder`] and can be merged when a second session
//! is started on top of a running one; disagreements on non-mergeable
//! settings come back as [`MergeConflict`] diagnostics.
//!
//! Pattern syntax is deliberately small: `*` matches any run of
//! characters, everything else is literal and case-sensitive.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod filter;
pub mod merge;
pub mod pattern;

pub use filter::{CategoryFilter, CategoryFilterBuilder};
pub use merge::MergeConflict;
pub use pattern::{glob_match, is_valid_component, DISABLED_BY_DEFAULT_PREFIX};
