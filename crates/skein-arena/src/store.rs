//! The [`ChunkStore`] trait, its iterator and owned snapshots.

use crate::chunk::Chunk;
use crate::config::StoreKind;

/// A slot in a store. `None` means the chunk is checked out (or, for a
/// ring, that the slot has never been issued).
pub(crate) type Slot = Option<Box<Chunk>>;

/// Owner of the chunks a capture session writes into.
///
/// Stores are not internally synchronized: the engine holds them under
/// its store lock. A chunk leaves the store on [`acquire_chunk`] and
/// returns on [`release_chunk`]; while it is out, its slot is empty and
/// iteration skips it.
///
/// [`acquire_chunk`]: ChunkStore::acquire_chunk
/// [`release_chunk`]: ChunkStore::release_chunk
pub trait ChunkStore: Send {
    /// Which strategy this store implements.
    fn kind(&self) -> StoreKind;

    /// Check out a chunk for writing.
    ///
    /// Returns the slot index and the chunk, or `None` when no chunk is
    /// available.
    fn acquire_chunk(&mut self) -> Option<(u32, Box<Chunk>)>;

    /// Return a chunk previously checked out at `index`.
    fn release_chunk(&mut self, index: u32, chunk: Box<Chunk>);

    /// Whether ordinary writers should stop. Metadata and flush paths
    /// may still acquire chunks.
    fn is_full(&self) -> bool;

    /// Total event capacity.
    fn capacity(&self) -> usize;

    /// Best-effort event count: issued slots times chunk capacity.
    ///
    /// Over-counts partially filled chunks.
    fn used_estimate(&self) -> usize;

    /// Per-chunk event capacity.
    fn chunk_capacity(&self) -> usize;

    /// The chunk resident at `index`, if not checked out.
    fn chunk(&self, index: u32) -> Option<&Chunk>;

    /// Mutable access to the chunk resident at `index`.
    fn chunk_mut(&mut self, index: u32) -> Option<&mut Chunk>;

    /// Resident chunks in drain order.
    fn iter(&self) -> StoreIter<'_>;

    /// Copy the resident chunks, in drain order, so they can be
    /// serialized without holding the store.
    fn snapshot_for_iteration(&self) -> StoreSnapshot {
        StoreSnapshot {
            chunks: self.iter().cloned().collect(),
        }
    }
}

// ── Iteration ──────────────────────────────────────────────────

#[derive(Clone, Debug)]
enum Order<'a> {
    /// Walk slots by index.
    Sequential { next: usize },
    /// Walk a circular index queue from `head` to `tail`.
    Queue {
        queue: &'a [u32],
        head: usize,
        tail: usize,
    },
}

/// Lazy iterator over the resident chunks of a store.
///
/// Checked-out and never-issued slots are skipped.
#[derive(Clone, Debug)]
pub struct StoreIter<'a> {
    slots: &'a [Slot],
    order: Order<'a>,
}

impl<'a> StoreIter<'a> {
    pub(crate) fn sequential(slots: &'a [Slot]) -> Self {
        Self {
            slots,
            order: Order::Sequential { next: 0 },
        }
    }

    pub(crate) fn queue(slots: &'a [Slot], queue: &'a [u32], head: usize, tail: usize) -> Self {
        Self {
            slots,
            order: Order::Queue { queue, head, tail },
        }
    }

    fn next_index(&mut self) -> Option<usize> {
        match &mut self.order {
            Order::Sequential { next } => {
                if *next >= self.slots.len() {
                    return None;
                }
                let i = *next;
                *next += 1;
                Some(i)
            }
            Order::Queue { queue, head, tail } => {
                if *head == *tail {
                    return None;
                }
                let i = queue[*head] as usize;
                *head = (*head + 1) % queue.len();
                Some(i)
            }
        }
    }
}

impl<'a> Iterator for StoreIter<'a> {
    type Item = &'a Chunk;

    fn next(&mut self) -> Option<&'a Chunk> {
        while let Some(i) = self.next_index() {
            if let Some(Some(chunk)) = self.slots.get(i) {
                return Some(&**chunk);
            }
        }
        None
    }
}

// ── Snapshot ───────────────────────────────────────────────────

/// Owned copy of a store's resident chunks, in drain order.
#[derive(Clone, Debug, Default)]
pub struct StoreSnapshot {
    chunks: Vec<Chunk>,
}

impl StoreSnapshot {
    /// Build a snapshot from chunks already in drain order.
    pub fn from_chunks(chunks: Vec<Chunk>) -> Self {
        Self { chunks }
    }

    /// Append a chunk (e.g. a copy of a live chunk outside the store).
    pub fn push(&mut self, chunk: Chunk) {
        self.chunks.push(chunk);
    }

    /// Chunks in drain order.
    pub fn iter(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.iter()
    }

    /// Number of chunks.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Whether the snapshot holds no chunks.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Total events across all chunks.
    pub fn event_count(&self) -> usize {
        self.chunks.iter().map(Chunk::len).sum()
    }
}
