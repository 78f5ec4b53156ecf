//! Store configuration errors.

use std::error::Error;
use std::fmt;

/// Errors from validating a [`StoreConfig`](crate::StoreConfig).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreError {
    /// `max_chunks` was zero.
    ZeroChunks,
    /// `max_chunks` does not fit a 32-bit slot index.
    TooManyChunks {
        /// Requested chunk count.
        requested: usize,
        /// Largest accepted chunk count.
        max: usize,
    },
    /// `chunk_capacity` was zero or does not fit a 16-bit event index.
    ChunkCapacityOutOfRange {
        /// Requested per-chunk capacity.
        capacity: usize,
        /// Largest accepted per-chunk capacity.
        max: usize,
    },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroChunks => write!(f, "store must hold at least one chunk"),
            Self::TooManyChunks { requested, max } => {
                write!(f, "store chunk count {requested} exceeds maximum {max}")
            }
            Self::ChunkCapacityOutOfRange { capacity, max } => {
                write!(f, "chunk capacity {capacity} outside 1..={max}")
            }
        }
    }
}

impl Error for StoreError {}
