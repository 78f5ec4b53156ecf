//! The store generation counter.

use std::sync::atomic::{AtomicU64, Ordering};

use skein_core::Generation;

/// Version of the active chunk store, bumped once per store swap.
///
/// Advanced only while the store lock is held, after any flush
/// requests for the outgoing generation have been posted. A reader
/// that observes the new value is therefore guaranteed to find those
/// requests in its queue.
pub struct GenerationCounter {
    current: AtomicU64,
}

impl Default for GenerationCounter {
    fn default() -> Self {
        Self::new()
    }
}

// Compile-time assertion: GenerationCounter must be Send + Sync.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<GenerationCounter>();
};

impl GenerationCounter {
    /// Start at generation zero.
    pub fn new() -> Self {
        Self {
            current: AtomicU64::new(0),
        }
    }

    /// Advance to the next generation and return it.
    pub fn advance(&self) -> Generation {
        Generation(self.current.fetch_add(1, Ordering::AcqRel) + 1)
    }

    /// Read the current generation.
    pub fn current(&self) -> Generation {
        Generation(self.current.load(Ordering::Acquire))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn advance_increments_by_one() {
        let g = GenerationCounter::new();
        assert_eq!(g.current(), Generation(0));
        assert_eq!(g.advance(), Generation(1));
        assert_eq!(g.advance(), Generation(2));
        assert_eq!(g.current(), Generation(2));
    }

    #[test]
    fn concurrent_advances_are_not_lost() {
        let g = Arc::new(GenerationCounter::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let g = Arc::clone(&g);
                thread::spawn(move || {
                    for _ in 0..250 {
                        g.advance();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(g.current(), Generation(1000));
    }
}
