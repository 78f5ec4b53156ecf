//! Per-thread capture state.
//!
//! Each OS thread gets a [`TraceThreadId`], a re-entrancy flag, and, for
//! every log it has registered with, a [`ThreadCache`] holding at most
//! one checked-out chunk. Writes into a cached chunk take no lock.
//!
//! A flush posts a [`FlushRequest`] to every registered thread that
//! holds a chunk, then bumps the generation. A thread that notices the
//! bump answers its queued requests first, surrendering the chunk if it
//! was issued under the requested generation, and only then discards
//! anything still stamped with an old generation.

use std::cell::{Cell, RefCell};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use crossbeam_channel::{Receiver, Sender};
use skein_arena::Chunk;
use skein_core::{EventHandle, Generation, TraceThreadId};

use crate::log::LogInner;
use crate::metrics::MetricCounters;

/// Process-unique id of a [`TraceLog`](crate::TraceLog) instance.
pub(crate) type LogId = u64;

// ── Flush protocol messages ────────────────────────────────────────

/// Ask a thread to hand over its chunk if it belongs to `generation`.
pub(crate) struct FlushRequest {
    pub(crate) generation: Generation,
    pub(crate) reply: Sender<Surrender>,
}

/// A thread's answer to a [`FlushRequest`].
pub(crate) struct Surrender {
    pub(crate) thread_id: TraceThreadId,
    pub(crate) chunk: Option<(u32, Box<Chunk>)>,
}

// ── Cached chunks ──────────────────────────────────────────────────

/// A checked-out chunk with the slot and generation it came from.
pub(crate) struct CachedChunk {
    pub(crate) index: u32,
    pub(crate) chunk: Box<Chunk>,
    pub(crate) generation: Generation,
}

impl CachedChunk {
    pub(crate) fn handle(&self, event_index: u16) -> EventHandle {
        EventHandle::new(self.chunk.seq(), self.index, event_index, self.generation)
    }

    /// Whether `handle` was issued against this chunk.
    pub(crate) fn owns(&self, handle: &EventHandle) -> bool {
        self.index == handle.chunk_index()
            && self.generation == handle.generation()
            && self.chunk.seq() == handle.chunk_seq()
    }
}

/// Coordinator-side record of a registered thread.
pub(crate) struct RegisteredThread {
    pub(crate) name: String,
    pub(crate) requests: Sender<FlushRequest>,
    /// Set under the store lock when the thread checks out a chunk.
    pub(crate) holds_chunk: Arc<AtomicBool>,
}

/// One registered thread's state for one log.
pub(crate) struct ThreadCache {
    log_id: LogId,
    log: Weak<LogInner>,
    requests: Receiver<FlushRequest>,
    holds_chunk: Arc<AtomicBool>,
    chunk: Option<CachedChunk>,
}

impl ThreadCache {
    pub(crate) fn chunk(&self) -> Option<&CachedChunk> {
        self.chunk.as_ref()
    }

    pub(crate) fn chunk_mut(&mut self) -> Option<&mut CachedChunk> {
        self.chunk.as_mut()
    }

    /// Install a freshly acquired chunk. Call with the store lock held.
    pub(crate) fn set_chunk(&mut self, chunk: CachedChunk) {
        self.holds_chunk.store(true, Ordering::Release);
        self.chunk = Some(chunk);
    }

    pub(crate) fn take_chunk(&mut self) -> Option<CachedChunk> {
        let taken = self.chunk.take();
        if taken.is_some() {
            self.holds_chunk.store(false, Ordering::Release);
        }
        taken
    }

    /// Answer every queued flush request. Returns how many were answered.
    pub(crate) fn answer_requests(&mut self, thread_id: TraceThreadId) -> usize {
        let mut answered = 0;
        while let Ok(request) = self.requests.try_recv() {
            let matches = self
                .chunk
                .as_ref()
                .is_some_and(|c| c.generation == request.generation);
            let chunk = if matches {
                self.take_chunk().map(|c| (c.index, c.chunk))
            } else {
                None
            };
            // A closed reply channel means that flush already gave up on
            // us; the chunk is dropped with the message.
            let _ = request.reply.send(Surrender { thread_id, chunk });
            answered += 1;
        }
        answered
    }

    /// Bring the cache up to `current`: answer queued requests, then drop
    /// a chunk left over from an older store.
    pub(crate) fn sync_generation(
        &mut self,
        thread_id: TraceThreadId,
        current: Generation,
        metrics: &MetricCounters,
    ) -> usize {
        let answered = self.answer_requests(thread_id);
        if self.chunk.as_ref().is_some_and(|c| c.generation != current) {
            self.take_chunk();
            MetricCounters::bump(&metrics.chunks_discarded);
        }
        answered
    }
}

// ── Thread-local state ─────────────────────────────────────────────

struct ThreadState {
    id: TraceThreadId,
    in_engine: Cell<bool>,
    caches: RefCell<Vec<ThreadCache>>,
}

impl ThreadState {
    fn new() -> Self {
        Self {
            id: TraceThreadId::next(),
            in_engine: Cell::new(false),
            caches: RefCell::new(Vec::new()),
        }
    }
}

impl Drop for ThreadState {
    fn drop(&mut self) {
        let id = self.id;
        for cache in self.caches.get_mut().drain(..) {
            if let Some(log) = cache.log.upgrade() {
                log.retire_cache(id, cache);
            }
        }
    }
}

thread_local! {
    static THREAD: ThreadState = ThreadState::new();
}

/// The calling thread's trace id, or `TraceThreadId(0)` during thread
/// teardown.
pub(crate) fn current_thread_id() -> TraceThreadId {
    THREAD.try_with(|t| t.id).unwrap_or(TraceThreadId(0))
}

/// Raised while the engine runs on this thread.
pub(crate) struct EngineGuard {
    armed: bool,
}

impl Drop for EngineGuard {
    fn drop(&mut self) {
        if self.armed {
            let _ = THREAD.try_with(|t| t.in_engine.set(false));
        }
    }
}

/// Mark the calling thread as inside the engine.
///
/// Returns `None` if it already is, meaning the caller is re-entering
/// from the engine's own bookkeeping and must bail out.
pub(crate) fn enter_engine() -> Option<EngineGuard> {
    match THREAD.try_with(|t| t.in_engine.replace(true)) {
        Ok(true) => None,
        Ok(false) => Some(EngineGuard { armed: true }),
        // Thread-local storage is being torn down; nothing to guard.
        Err(_) => Some(EngineGuard { armed: false }),
    }
}

/// Run `f` on the calling thread's cache for `log_id`, if registered.
pub(crate) fn with_cache<R>(log_id: LogId, f: impl FnOnce(&mut ThreadCache) -> R) -> Option<R> {
    THREAD
        .try_with(|t| {
            let mut caches = t.caches.try_borrow_mut().ok()?;
            let cache = caches.iter_mut().find(|c| c.log_id == log_id)?;
            Some(f(cache))
        })
        .ok()
        .flatten()
}

/// Give the calling thread a cache for `log`.
///
/// Returns `false` if one already exists. Caches of dropped logs are
/// pruned on the way.
pub(crate) fn install_cache(
    log_id: LogId,
    log: Weak<LogInner>,
    requests: Receiver<FlushRequest>,
    holds_chunk: Arc<AtomicBool>,
) -> bool {
    THREAD
        .try_with(|t| {
            let Ok(mut caches) = t.caches.try_borrow_mut() else {
                return false;
            };
            caches.retain(|c| c.log.strong_count() > 0);
            if caches.iter().any(|c| c.log_id == log_id) {
                return false;
            }
            caches.push(ThreadCache {
                log_id,
                log,
                requests,
                holds_chunk,
                chunk: None,
            });
            true
        })
        .unwrap_or(false)
}

/// Detach the calling thread's cache for `log_id`.
pub(crate) fn remove_cache(log_id: LogId) -> Option<ThreadCache> {
    THREAD
        .try_with(|t| {
            let mut caches = t.caches.try_borrow_mut().ok()?;
            let pos = caches.iter().position(|c| c.log_id == log_id)?;
            Some(caches.swap_remove(pos))
        })
        .ok()
        .flatten()
}

// ── Cache retirement ───────────────────────────────────────────────

impl LogInner {
    /// Final surrender for a cache whose thread is leaving.
    ///
    /// Answers pending requests, returns a current-generation chunk to
    /// the active store, and removes the thread from the flush wait set.
    pub(crate) fn retire_cache(&self, thread_id: TraceThreadId, mut cache: ThreadCache) {
        loop {
            cache.sync_generation(thread_id, self.generation.current(), &self.metrics);
            if cache.chunk().is_none() {
                break;
            }
            let mut st = self.lock_store();
            let current = self.generation.current();
            if cache.chunk().is_some_and(|c| c.generation == current) {
                if let Some(cached) = cache.take_chunk() {
                    st.store.release_chunk(cached.index, cached.chunk);
                }
                break;
            }
            // The store was swapped since the sync; a flush request for
            // our chunk, if any, is already queued.
        }

        self.lock_threads().swap_remove(&thread_id);
        cache.answer_requests(thread_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skein_core::ChunkSeq;

    fn cache_with_chunk(generation: Generation) -> (ThreadCache, Sender<FlushRequest>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut cache = ThreadCache {
            log_id: 0,
            log: Weak::new(),
            requests: rx,
            holds_chunk: Arc::new(AtomicBool::new(false)),
            chunk: None,
        };
        cache.set_chunk(CachedChunk {
            index: 4,
            chunk: Box::new(Chunk::new(ChunkSeq(9), 8)),
            generation,
        });
        (cache, tx)
    }

    #[test]
    fn matching_request_surrenders_chunk() {
        let (mut cache, tx) = cache_with_chunk(Generation(2));
        let (reply_tx, reply_rx) = crossbeam_channel::unbounded();
        tx.send(FlushRequest {
            generation: Generation(2),
            reply: reply_tx,
        })
        .unwrap();
        let metrics = MetricCounters::default();
        assert_eq!(cache.sync_generation(TraceThreadId(5), Generation(3), &metrics), 1);
        let s = reply_rx.try_recv().unwrap();
        assert_eq!(s.thread_id, TraceThreadId(5));
        assert_eq!(s.chunk.map(|(i, c)| (i, c.seq())), Some((4, ChunkSeq(9))));
        assert!(cache.chunk().is_none());
        assert!(!cache.holds_chunk.load(Ordering::Acquire));
        assert_eq!(metrics.snapshot().chunks_discarded, 0);
    }

    #[test]
    fn mismatched_request_answers_empty_and_stale_chunk_is_discarded() {
        let (mut cache, tx) = cache_with_chunk(Generation(1));
        let (reply_tx, reply_rx) = crossbeam_channel::unbounded();
        tx.send(FlushRequest {
            generation: Generation(2),
            reply: reply_tx,
        })
        .unwrap();
        let metrics = MetricCounters::default();
        cache.sync_generation(TraceThreadId(5), Generation(3), &metrics);
        assert!(reply_rx.try_recv().unwrap().chunk.is_none());
        assert!(cache.chunk().is_none());
        assert_eq!(metrics.snapshot().chunks_discarded, 1);
    }

    #[test]
    fn current_chunk_survives_sync() {
        let (mut cache, _tx) = cache_with_chunk(Generation(3));
        let metrics = MetricCounters::default();
        assert_eq!(cache.sync_generation(TraceThreadId(5), Generation(3), &metrics), 0);
        assert!(cache.chunk().is_some());
    }

    #[test]
    fn closed_reply_channel_drops_chunk() {
        let (mut cache, tx) = cache_with_chunk(Generation(2));
        let (reply_tx, reply_rx) = crossbeam_channel::unbounded();
        drop(reply_rx);
        tx.send(FlushRequest {
            generation: Generation(2),
            reply: reply_tx,
        })
        .unwrap();
        assert_eq!(cache.answer_requests(TraceThreadId(1)), 1);
        assert!(cache.chunk().is_none());
    }

    #[test]
    fn guard_detects_reentry() {
        let outer = enter_engine();
        assert!(outer.is_some());
        assert!(enter_engine().is_none());
        drop(outer);
        assert!(enter_engine().is_some());
    }

    #[test]
    fn thread_ids_differ_across_threads() {
        let here = current_thread_id();
        let there = std::thread::spawn(current_thread_id).join().unwrap();
        assert_ne!(here, there);
        assert_eq!(here, current_thread_id());
    }
}
