//! Store strategy selection and sizing.

use std::fmt;

use skein_core::RecordMode;

use crate::error::StoreError;
use crate::grow::GrowStore;
use crate::ring::RingStore;
use crate::store::ChunkStore;

/// Which [`ChunkStore`] strategy to build.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StoreKind {
    /// [`RingStore`]: fixed slots, oldest data overwritten.
    Ring,
    /// [`GrowStore`]: append until a ceiling, then report full.
    Grow,
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ring => f.write_str("ring"),
            Self::Grow => f.write_str("grow"),
        }
    }
}

/// Strategy and sizing for a chunk store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StoreConfig {
    /// Strategy.
    pub kind: StoreKind,
    /// Ring: number of slots. Grow: chunk count at which the store is full.
    pub max_chunks: usize,
    /// Events per chunk.
    pub chunk_capacity: usize,
}

impl StoreConfig {
    /// Default events per chunk.
    pub const DEFAULT_CHUNK_CAPACITY: usize = 64;

    /// Largest accepted `max_chunks` (slot indices are `u32`, and the
    /// ring queue needs one spare entry).
    pub const MAX_CHUNKS: usize = u32::MAX as usize - 1;

    /// Largest accepted `chunk_capacity` (event indices are `u16`).
    pub const MAX_CHUNK_CAPACITY: usize = u16::MAX as usize;

    /// A ring store with the default chunk capacity.
    pub fn ring(max_chunks: usize) -> Self {
        Self {
            kind: StoreKind::Ring,
            max_chunks,
            chunk_capacity: Self::DEFAULT_CHUNK_CAPACITY,
        }
    }

    /// A grow store with the default chunk capacity.
    pub fn grow(max_chunks: usize) -> Self {
        Self {
            kind: StoreKind::Grow,
            max_chunks,
            chunk_capacity: Self::DEFAULT_CHUNK_CAPACITY,
        }
    }

    /// Override the per-chunk capacity.
    pub fn with_chunk_capacity(mut self, chunk_capacity: usize) -> Self {
        self.chunk_capacity = chunk_capacity;
        self
    }

    /// The store each record mode uses unless overridden.
    pub fn for_record_mode(mode: RecordMode) -> Self {
        match mode {
            RecordMode::RecordUntilFull => Self::grow(4000),
            RecordMode::RecordContinuously => Self::ring(1000),
            RecordMode::RecordAsMuchAsPossible => Self::grow(8000),
            RecordMode::EchoToConsole => Self::ring(256),
        }
    }

    /// Check sizes.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.max_chunks == 0 {
            return Err(StoreError::ZeroChunks);
        }
        if self.max_chunks > Self::MAX_CHUNKS {
            return Err(StoreError::TooManyChunks {
                requested: self.max_chunks,
                max: Self::MAX_CHUNKS,
            });
        }
        if self.chunk_capacity == 0 || self.chunk_capacity > Self::MAX_CHUNK_CAPACITY {
            return Err(StoreError::ChunkCapacityOutOfRange {
                capacity: self.chunk_capacity,
                max: Self::MAX_CHUNK_CAPACITY,
            });
        }
        Ok(())
    }

    /// Build a fresh, empty store. Range checks live in
    /// [`validate`](Self::validate); callers run it once up front.
    pub fn build(&self) -> Box<dyn ChunkStore> {
        match self.kind {
            StoreKind::Ring => Box::new(RingStore::new(self.max_chunks, self.chunk_capacity)),
            StoreKind::Grow => Box::new(GrowStore::new(self.max_chunks, self.chunk_capacity)),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::for_record_mode(RecordMode::default())
    }
}
