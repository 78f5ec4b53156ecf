//! Append-only store that saturates at a ceiling.

use skein_core::ChunkSeq;

use crate::chunk::Chunk;
use crate::config::StoreKind;
use crate::store::{ChunkStore, Slot, StoreIter};

/// A store that appends one new slot per acquisition.
///
/// Chunk sequence numbers are the slot position plus one, so they are
/// unique within a store but repeat across stores. The store reports
/// full once `max_chunks` slots exist (checked-out slots included), yet
/// keeps issuing chunks so that metadata and flush bookkeeping can
/// still be written. Old data is never discarded.
#[derive(Debug)]
pub struct GrowStore {
    slots: Vec<Slot>,
    max_chunks: usize,
    chunk_capacity: usize,
}

impl GrowStore {
    /// Create an empty store with the given ceiling.
    pub fn new(max_chunks: usize, chunk_capacity: usize) -> Self {
        Self {
            slots: Vec::new(),
            max_chunks,
            chunk_capacity,
        }
    }

    /// Ceiling on the number of chunks before the store reports full.
    pub fn max_chunks(&self) -> usize {
        self.max_chunks
    }

    /// Number of slots issued so far.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no chunk has been issued.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl ChunkStore for GrowStore {
    fn kind(&self) -> StoreKind {
        StoreKind::Grow
    }

    fn acquire_chunk(&mut self) -> Option<(u32, Box<Chunk>)> {
        let index = u32::try_from(self.slots.len()).ok()?;
        let seq = ChunkSeq(index.checked_add(1)?);
        self.slots.push(None);
        Some((index, Box::new(Chunk::new(seq, self.chunk_capacity))))
    }

    fn release_chunk(&mut self, index: u32, chunk: Box<Chunk>) {
        if let Some(slot) = self.slots.get_mut(index as usize) {
            debug_assert!(slot.is_none(), "grow slot {index} released twice");
            *slot = Some(chunk);
        }
    }

    fn is_full(&self) -> bool {
        self.slots.len() >= self.max_chunks
    }

    fn capacity(&self) -> usize {
        self.max_chunks * self.chunk_capacity
    }

    fn used_estimate(&self) -> usize {
        self.slots.len() * self.chunk_capacity
    }

    fn chunk_capacity(&self) -> usize {
        self.chunk_capacity
    }

    fn chunk(&self, index: u32) -> Option<&Chunk> {
        self.slots.get(index as usize)?.as_deref()
    }

    fn chunk_mut(&mut self, index: u32) -> Option<&mut Chunk> {
        self.slots.get_mut(index as usize)?.as_deref_mut()
    }

    fn iter(&self) -> StoreIter<'_> {
        StoreIter::sequential(&self.slots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seq_is_position_plus_one() {
        let mut store = GrowStore::new(4, 8);
        let (i0, c0) = store.acquire_chunk().unwrap();
        let (i1, c1) = store.acquire_chunk().unwrap();
        assert_eq!((i0, c0.seq()), (0, ChunkSeq(1)));
        assert_eq!((i1, c1.seq()), (1, ChunkSeq(2)));
    }

    #[test]
    fn acquisition_succeeds_past_full() {
        let mut store = GrowStore::new(1, 8);
        let _ = store.acquire_chunk().unwrap();
        assert!(store.is_full());
        assert!(store.acquire_chunk().is_some());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn iteration_skips_checked_out_slots() {
        let mut store = GrowStore::new(4, 8);
        let (i0, c0) = store.acquire_chunk().unwrap();
        let (_i1, _c1) = store.acquire_chunk().unwrap();
        let (i2, c2) = store.acquire_chunk().unwrap();
        store.release_chunk(i2, c2);
        store.release_chunk(i0, c0);
        let seqs: Vec<_> = store.iter().map(Chunk::seq).collect();
        assert_eq!(seqs, vec![ChunkSeq(1), ChunkSeq(3)]);
    }

    #[test]
    fn used_estimate_counts_issued_slots() {
        let mut store = GrowStore::new(4, 8);
        let _ = store.acquire_chunk();
        let _ = store.acquire_chunk();
        assert_eq!(store.used_estimate(), 16);
        assert_eq!(store.capacity(), 32);
    }

    #[cfg(not(miri))]
    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn grow_store_saturates_after_k(k in 1usize..64, extra in 0usize..16) {
                let mut store = GrowStore::new(k, 4);
                for n in 0..k {
                    prop_assert!(!store.is_full(), "full after {} of {}", n, k);
                    let (idx, chunk) = store.acquire_chunk().expect("grow acquire");
                    store.release_chunk(idx, chunk);
                }
                prop_assert!(store.is_full());
                for _ in 0..extra {
                    let (idx, chunk) = store.acquire_chunk().expect("acquire past full");
                    store.release_chunk(idx, chunk);
                    prop_assert!(store.is_full());
                }
            }
        }
    }
}
