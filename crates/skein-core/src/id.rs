//! Strongly-typed identifiers.

use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Sequence number stamped on a chunk when it is issued by a store.
///
/// Zero is never a valid sequence number, so a zeroed handle can never
/// resolve to a live chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkSeq(pub u32);

/// Counter for process-wide [`ChunkSeq`] allocation.
static CHUNK_SEQ_COUNTER: AtomicU32 = AtomicU32::new(1);

impl ChunkSeq {
    /// Allocate the next process-wide sequence number.
    ///
    /// Strictly increasing until the counter wraps at `u32::MAX`, after
    /// which zero is skipped. Thread-safe.
    pub fn next() -> Self {
        loop {
            let seq = CHUNK_SEQ_COUNTER.fetch_add(1, Ordering::Relaxed);
            if seq != 0 {
                return Self(seq);
            }
        }
    }

    /// Whether this is a usable (non-zero) sequence number.
    pub fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for ChunkSeq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for ChunkSeq {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Stable index of a category group in the registry.
///
/// Assigned once when the name is first admitted and never reused, so
/// it translates back to the name in O(1).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CategoryIndex(pub u16);

impl fmt::Display for CategoryIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u16> for CategoryIndex {
    fn from(v: u16) -> Self {
        Self(v)
    }
}

/// Version of the active chunk store.
///
/// Incremented exactly once each time the store is replaced wholesale.
/// Caches stamped with an older generation must discard (or surrender)
/// their chunk before writing again.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Generation(pub u64);

impl Generation {
    /// The generation that follows this one.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Generation {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// Counter for unique [`TraceThreadId`] allocation.
static TRACE_THREAD_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Numeric id for a thread as it appears in captured events.
///
/// `std::thread::ThreadId` has no stable numeric form, so the engine
/// hands out its own ids lazily, one per OS thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TraceThreadId(pub u64);

impl TraceThreadId {
    /// Allocate a fresh, never-before-returned id. Thread-safe.
    pub fn next() -> Self {
        Self(TRACE_THREAD_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for TraceThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for TraceThreadId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_seq_is_strictly_increasing() {
        let a = ChunkSeq::next();
        let b = ChunkSeq::next();
        assert!(a.is_valid());
        assert!(b > a);
    }

    #[test]
    fn zero_chunk_seq_is_invalid() {
        assert!(!ChunkSeq(0).is_valid());
    }

    #[test]
    fn generation_next_increments() {
        assert_eq!(Generation(0).next(), Generation(1));
        assert_eq!(Generation::default(), Generation(0));
    }

    #[test]
    fn trace_thread_ids_are_unique() {
        let ids: Vec<_> = (0..64).map(|_| TraceThreadId::next()).collect();
        let unique: std::collections::HashSet<_> = ids.iter().collect();
        assert_eq!(unique.len(), ids.len());
    }

    #[test]
    fn display_matches_inner_value() {
        assert_eq!(ChunkSeq(7).to_string(), "7");
        assert_eq!(CategoryIndex(3).to_string(), "3");
        assert_eq!(Generation(9).to_string(), "9");
        assert_eq!(TraceThreadId(11).to_string(), "11");
    }
}
