//! Core types and traits for the Skein trace-event engine.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the vocabulary shared by the rest of the workspace: strongly-typed
//! ids, the fixed-shape [`EventRecord`], the [`EventHandle`] address
//! used to revisit an event, category and event flag bitsets, record
//! modes, the [`Clock`] abstraction, and the collaborator traits for
//! formatting ([`EventFormatter`]) and draining ([`DrainSink`]).

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod clock;
pub mod event;
pub mod flags;
pub mod handle;
pub mod id;
pub mod mode;
pub mod traits;

pub use clock::{Clock, MonotonicClock};
pub use event::{Arg, ArgValue, Args, EventBuilder, EventRecord, Phase, MAX_ARGS};
pub use flags::{CategoryFlags, EventFlags};
pub use handle::EventHandle;
pub use id::{CategoryIndex, ChunkSeq, Generation, TraceThreadId};
pub use mode::{CaptureMode, RecordMode};
pub use traits::{DrainSink, EventFormatter, FormatContext};
