//! Opaque references to a stored event.

use std::fmt;

use crate::id::{ChunkSeq, Generation};

/// Address of an event inside a chunk store.
///
/// A handle is only meaningful while the chunk at `chunk_index` still
/// carries `chunk_seq` under the same store `generation`. Once the slot
/// is reissued or the store retired, resolving the handle yields nothing
/// and closing through it is a no-op.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EventHandle {
    chunk_seq: ChunkSeq,
    chunk_index: u32,
    event_index: u16,
    generation: Generation,
}

impl EventHandle {
    /// Build a handle from its parts.
    pub fn new(
        chunk_seq: ChunkSeq,
        chunk_index: u32,
        event_index: u16,
        generation: Generation,
    ) -> Self {
        Self {
            chunk_seq,
            chunk_index,
            event_index,
            generation,
        }
    }

    /// Sequence number of the chunk at issuance.
    pub fn chunk_seq(&self) -> ChunkSeq {
        self.chunk_seq
    }

    /// Slot index of the chunk in its store.
    pub fn chunk_index(&self) -> u32 {
        self.chunk_index
    }

    /// Position of the event within the chunk.
    pub fn event_index(&self) -> u16 {
        self.event_index
    }

    /// Store generation the chunk was issued under.
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Whether this handle can ever resolve.
    pub fn is_valid(&self) -> bool {
        self.chunk_seq.is_valid()
    }
}

impl fmt::Display for EventHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "g{}:chunk[{}]#{}:{}",
            self.generation, self.chunk_index, self.chunk_seq, self.event_index
        )
    }
}
