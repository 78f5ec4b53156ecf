//! Fixed-capacity blocks of event records.

use skein_core::{ChunkSeq, EventRecord};

/// A fixed-capacity block of [`EventRecord`]s.
///
/// A chunk is written by exactly one owner at a time (a thread cache or
/// the shared chunk) and handed back to its store when full. The
/// sequence number is stamped by the store at issuance and changes
/// every time a ring slot is reissued.
#[derive(Clone, Debug)]
pub struct Chunk {
    seq: ChunkSeq,
    events: Vec<EventRecord>,
    capacity: usize,
}

impl Chunk {
    /// Create an empty chunk. Storage is reserved up front.
    pub fn new(seq: ChunkSeq, capacity: usize) -> Self {
        Self {
            seq,
            events: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Sequence number stamped at issuance.
    pub fn seq(&self) -> ChunkSeq {
        self.seq
    }

    /// Number of events written so far.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether no events have been written.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Whether the write cursor has reached capacity.
    pub fn is_full(&self) -> bool {
        self.events.len() >= self.capacity
    }

    /// Maximum number of events.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append an event, returning its index, or `None` when full.
    pub fn push(&mut self, event: EventRecord) -> Option<u16> {
        if self.is_full() {
            return None;
        }
        let index = u16::try_from(self.events.len()).ok()?;
        self.events.push(event);
        Some(index)
    }

    /// The event at `index`, if written.
    pub fn event(&self, index: u16) -> Option<&EventRecord> {
        self.events.get(usize::from(index))
    }

    /// Mutable access to the event at `index`, if written.
    pub fn event_mut(&mut self, index: u16) -> Option<&mut EventRecord> {
        self.events.get_mut(usize::from(index))
    }

    /// Written events in order.
    pub fn events(&self) -> &[EventRecord] {
        &self.events
    }

    /// Clear the chunk for reissue under a new sequence number.
    ///
    /// Keeps the allocation.
    pub fn reset(&mut self, seq: ChunkSeq) {
        self.events.clear();
        self.seq = seq;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skein_core::{CategoryIndex, EventBuilder, TraceThreadId};

    fn event(name: &'static str) -> EventRecord {
        EventBuilder::instant(name).build(CategoryIndex(0), TraceThreadId(1), 0, None)
    }

    #[test]
    fn push_until_full() {
        let mut c = Chunk::new(ChunkSeq(1), 2);
        assert_eq!(c.push(event("a")), Some(0));
        assert_eq!(c.push(event("b")), Some(1));
        assert!(c.is_full());
        assert_eq!(c.push(event("c")), None);
        assert_eq!(c.len(), 2);
    }

    #[test]
    fn reset_clears_and_restamps() {
        let mut c = Chunk::new(ChunkSeq(1), 4);
        c.push(event("a"));
        c.reset(ChunkSeq(9));
        assert!(c.is_empty());
        assert_eq!(c.seq(), ChunkSeq(9));
        assert!(c.event(0).is_none());
    }

    #[test]
    fn event_mut_reaches_written_slot() {
        let mut c = Chunk::new(ChunkSeq(1), 4);
        let idx = c.push(event("a")).unwrap();
        c.event_mut(idx).unwrap().close(10, None);
        assert!(c.event(idx).unwrap().is_closed());
        assert!(c.event_mut(3).is_none());
    }
}
