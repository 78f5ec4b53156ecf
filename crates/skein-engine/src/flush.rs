//! Flush coordination: retire the active store, collect surrendered
//! chunks, and serialize everything into the caller's sink.
//!
//! A flush moves through `Idle → AwaitingSurrender → Draining → Idle`.
//! The store swap happens synchronously on the calling thread; waiting
//! for surrenders and draining run either inline or on a named
//! background thread.

use std::error::Error;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError};
use indexmap::IndexMap;
use skein_arena::{Chunk, ChunkStore};
use skein_core::{DrainSink, EventBuilder, Generation, TraceThreadId};

use crate::drain::{drain, DrainContext, DrainStats};
use crate::log::{LogInner, StoreState, TraceLog};
use crate::metrics::MetricCounters;
use crate::observer::ArgumentPredicate;
use crate::registry::METADATA_INDEX;
use crate::thread::{self, FlushRequest, Surrender};

// ── FlushError ─────────────────────────────────────────────────────

/// Why a flush did not run to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushError {
    /// Capture is still enabled; call `disable()` first. The sink was
    /// called once with an empty final fragment.
    CaptureEnabled,
    /// Another flush of this log is running.
    FlushInProgress,
    /// The background flush thread could not be started. The retired
    /// store is lost.
    ThreadSpawnFailed {
        /// OS error description.
        reason: String,
    },
    /// The background flush thread panicked, typically inside the sink.
    FlushThreadPanicked,
}

impl fmt::Display for FlushError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CaptureEnabled => write!(f, "cannot flush while capture is enabled"),
            Self::FlushInProgress => write!(f, "a flush is already in progress"),
            Self::ThreadSpawnFailed { reason } => {
                write!(f, "failed to spawn flush thread: {reason}")
            }
            Self::FlushThreadPanicked => write!(f, "flush thread panicked"),
        }
    }
}

impl Error for FlushError {}

// ── Reports ────────────────────────────────────────────────────────

/// A registered thread that did not surrender its chunk in time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LateThread {
    /// Trace id of the thread.
    pub id: TraceThreadId,
    /// Name it registered with.
    pub name: String,
}

/// Outcome of a completed flush.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlushReport {
    /// Generation whose store was drained.
    pub generation: Generation,
    /// Events serialized.
    pub events: usize,
    /// Chunks serialized.
    pub chunks: usize,
    /// Sink calls made.
    pub fragments: usize,
    /// Threads whose chunks missed the flush.
    pub late_threads: Vec<LateThread>,
    /// Wall time from the start of the flush to the last fragment.
    pub elapsed: Duration,
}

enum HandleState {
    Done(FlushReport),
    Pending(JoinHandle<FlushReport>),
}

/// A flush that has retired its store and is (or was) draining it.
pub struct FlushHandle {
    state: HandleState,
}

impl FlushHandle {
    /// Whether the drain has finished. Never blocks.
    pub fn is_finished(&self) -> bool {
        match &self.state {
            HandleState::Done(_) => true,
            HandleState::Pending(handle) => handle.is_finished(),
        }
    }

    /// Block until the drain finishes.
    pub fn wait(self) -> Result<FlushReport, FlushError> {
        match self.state {
            HandleState::Done(report) => Ok(report),
            HandleState::Pending(handle) => handle.join().map_err(|_| FlushError::FlushThreadPanicked),
        }
    }
}

impl fmt::Debug for FlushHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlushHandle")
            .field("finished", &self.is_finished())
            .finish()
    }
}

// ── State machine ──────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
enum FlushState {
    Idle = 0,
    AwaitingSurrender = 1,
    Draining = 2,
}

pub(crate) struct FlushStateCell(AtomicU8);

impl FlushStateCell {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(FlushState::Idle as u8))
    }

    fn begin(&self) -> bool {
        self.0
            .compare_exchange(
                FlushState::Idle as u8,
                FlushState::AwaitingSurrender as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    fn set(&self, state: FlushState) {
        self.0.store(state as u8, Ordering::Release);
    }

    pub(crate) fn is_idle(&self) -> bool {
        self.0.load(Ordering::Acquire) == FlushState::Idle as u8
    }
}

/// Returns the log to `Idle` when the flush ends, however it ends.
struct InFlight {
    inner: Arc<LogInner>,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.inner.flush_state.set(FlushState::Idle);
    }
}

/// A store taken out of service, plus what is needed to finish it.
struct Retired {
    store: Box<dyn ChunkStore>,
    generation: Generation,
    waiting: IndexMap<TraceThreadId, String>,
    replies: Receiver<Surrender>,
    arg_predicate: Option<ArgumentPredicate>,
    started: Instant,
    in_flight: InFlight,
}

impl Retired {
    fn complete(self, sink: &mut dyn DrainSink) -> FlushReport {
        let Retired {
            mut store,
            generation,
            mut waiting,
            replies,
            arg_predicate,
            started,
            in_flight,
        } = self;
        let inner = &*in_flight.inner;

        let deadline = Instant::now() + inner.config.flush_timeout;
        while !waiting.is_empty() {
            match replies.recv_deadline(deadline) {
                Ok(Surrender { thread_id, chunk }) => {
                    waiting.swap_remove(&thread_id);
                    if let Some((index, chunk)) = chunk {
                        store.release_chunk(index, chunk);
                    }
                }
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => {
                    waiting.clear();
                }
            }
        }
        // Late replies now fail to send and their chunks are dropped.
        drop(replies);

        let late_threads: Vec<LateThread> = waiting
            .into_iter()
            .map(|(id, name)| LateThread { id, name })
            .collect();
        if !late_threads.is_empty() {
            MetricCounters::bump(&inner.metrics.flush_timeouts);
            MetricCounters::add(&inner.metrics.late_threads, late_threads.len() as u64);
            for late in &late_threads {
                tracing::warn!(
                    thread_id = %late.id,
                    thread = %late.name,
                    timeout_ms = inner.config.flush_timeout.as_millis() as u64,
                    "thread did not surrender its chunk before the flush timeout"
                );
            }
        }

        inner.flush_state.set(FlushState::Draining);
        let stats = drain(
            store.iter(),
            &DrainContext {
                registry: &inner.registry,
                formatter: &*inner.config.formatter,
                max_fragment_bytes: inner.config.max_fragment_bytes,
                arg_predicate: arg_predicate.as_ref(),
            },
            sink,
        );
        MetricCounters::bump(&inner.metrics.flushes);

        let elapsed = started.elapsed();
        tracing::debug!(
            %generation,
            events = stats.events,
            chunks = stats.chunks,
            fragments = stats.fragments,
            late = late_threads.len(),
            elapsed_us = elapsed.as_micros() as u64,
            "flush complete"
        );
        report(generation, stats, late_threads, elapsed)
    }
}

fn report(
    generation: Generation,
    stats: DrainStats,
    late_threads: Vec<LateThread>,
    elapsed: Duration,
) -> FlushReport {
    FlushReport {
        generation,
        events: stats.events,
        chunks: stats.chunks,
        fragments: stats.fragments,
        late_threads,
        elapsed,
    }
}

impl LogInner {
    /// Append `process_name`, `thread_name` and overflow metadata to the
    /// store about to be retired. Metadata ignores the grow store's
    /// full state.
    fn append_metadata(&self, st: &mut StoreState, process_name: Option<&str>) {
        let now = self.config.clock.now_ns();
        let mut events = Vec::new();
        if let Some(name) = process_name {
            events.push(
                EventBuilder::metadata("process_name")
                    .with_arg("name", name.to_string())
                    .build(METADATA_INDEX, TraceThreadId(0), now, None),
            );
        }
        for (&tid, name) in &st.thread_names {
            events.push(
                EventBuilder::metadata("thread_name")
                    .with_arg("name", name.clone())
                    .build(METADATA_INDEX, tid, now, None),
            );
        }
        if let Some(ts) = st.overflowed_at {
            events.push(
                EventBuilder::metadata("trace_buffer_overflowed")
                    .with_arg("overflowed_at_ts", ts)
                    .build(METADATA_INDEX, TraceThreadId(0), now, None),
            );
        }

        let mut current: Option<(u32, Box<Chunk>)> = None;
        for event in events {
            if let Some((index, chunk)) = current.take() {
                if chunk.is_full() {
                    st.store.release_chunk(index, chunk);
                } else {
                    current = Some((index, chunk));
                }
            }
            if current.is_none() {
                current = st.store.acquire_chunk();
            }
            match current.as_mut() {
                Some((_, chunk)) => {
                    chunk.push(event);
                }
                None => {
                    MetricCounters::bump(&self.metrics.events_dropped_no_chunk);
                    break;
                }
            }
        }
        if let Some((index, chunk)) = current {
            st.store.release_chunk(index, chunk);
        }
    }
}

// ── TraceLog flush API ─────────────────────────────────────────────

impl TraceLog {
    /// Retire the active store and serialize it into `sink`.
    ///
    /// Capture must be disabled. The store is swapped for an empty one
    /// and the generation advanced before this returns; registered
    /// threads holding chunks of the retired store are asked to
    /// surrender them and are waited for up to the configured flush
    /// timeout. With `use_background_thread` the wait and the drain run
    /// on a thread named `skein-flush` and the returned handle is
    /// pending; otherwise they run here and the handle is complete.
    pub fn flush<S>(&self, mut sink: S, use_background_thread: bool) -> Result<FlushHandle, FlushError>
    where
        S: DrainSink + 'static,
    {
        let inner = &self.inner;
        let started = Instant::now();

        let retired = {
            let session = inner.lock_session();
            if session.enabled_modes.is_any() {
                drop(session);
                tracing::warn!("flush refused while capture is enabled; disable first");
                sink.write_fragment("", false);
                return Err(FlushError::CaptureEnabled);
            }
            if !inner.flush_state.begin() {
                return Err(FlushError::FlushInProgress);
            }
            let in_flight = InFlight {
                inner: Arc::clone(inner),
            };

            let mut guard = inner.lock_store();
            let st = &mut *guard;
            if let Some(shared) = st.shared.take() {
                st.store.release_chunk(shared.index, shared.chunk);
            }
            inner.append_metadata(st, session.process_name.as_deref());

            let generation = inner.generation.current();
            let (reply_tx, replies) = crossbeam_channel::unbounded();
            let mut waiting = IndexMap::new();
            for (&tid, registered) in inner.lock_threads().iter() {
                if !registered.holds_chunk.load(Ordering::Acquire) {
                    continue;
                }
                let request = FlushRequest {
                    generation,
                    reply: reply_tx.clone(),
                };
                if registered.requests.send(request).is_ok() {
                    waiting.insert(tid, registered.name.clone());
                }
            }

            let store = std::mem::replace(&mut st.store, session.store_config.build());
            st.overflowed_at = None;
            inner.generation.advance();
            tracing::debug!(%generation, waiting = waiting.len(), "retired store for flush");

            Retired {
                store,
                generation,
                waiting,
                replies,
                arg_predicate: session.drain_predicate(),
                started,
                in_flight,
            }
        };

        // The flushing thread may itself hold a chunk of the retired store.
        self.service_current_thread();

        if use_background_thread {
            std::thread::Builder::new()
                .name("skein-flush".into())
                .spawn(move || retired.complete(&mut sink))
                .map(|handle| FlushHandle {
                    state: HandleState::Pending(handle),
                })
                .map_err(|e| {
                    tracing::warn!(error = %e, "failed to spawn flush thread; retired store dropped");
                    FlushError::ThreadSpawnFailed {
                        reason: e.to_string(),
                    }
                })
        } else {
            Ok(FlushHandle {
                state: HandleState::Done(retired.complete(&mut sink)),
            })
        }
    }

    /// Serialize a copy of everything captured so far without retiring
    /// the store. Allowed while capture is enabled.
    ///
    /// Includes the resident chunks, the shared chunk and the calling
    /// thread's own cached chunk. Chunks cached by other threads are not
    /// visible.
    pub fn flush_without_retiring(&self, mut sink: impl DrainSink) -> FlushReport {
        let inner = &self.inner;
        let started = Instant::now();
        let arg_predicate = inner.lock_session().drain_predicate();

        let (mut snapshot, generation) = {
            let st = inner.lock_store();
            let mut snapshot = st.store.snapshot_for_iteration();
            if let Some(shared) = &st.shared {
                snapshot.push((*shared.chunk).clone());
            }
            (snapshot, inner.generation.current())
        };
        let own = thread::with_cache(inner.id, |cache| {
            cache
                .chunk()
                .filter(|c| c.generation == generation)
                .map(|c| (*c.chunk).clone())
        })
        .flatten();
        if let Some(chunk) = own {
            snapshot.push(chunk);
        }

        let stats = drain(
            snapshot.iter(),
            &DrainContext {
                registry: &inner.registry,
                formatter: &*inner.config.formatter,
                max_fragment_bytes: inner.config.max_fragment_bytes,
                arg_predicate: arg_predicate.as_ref(),
            },
            &mut sink,
        );
        report(generation, stats, Vec::new(), started.elapsed())
    }

    /// Whether no flush is running.
    pub fn is_flush_idle(&self) -> bool {
        self.inner.flush_state.is_idle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TraceLogConfig;
    use skein_core::CaptureMode;
    use skein_filter::CategoryFilter;
    use std::sync::Mutex;

    fn collect() -> (Arc<Mutex<Vec<(String, bool)>>>, impl DrainSink + 'static) {
        let out = Arc::new(Mutex::new(Vec::new()));
        let sink_out = Arc::clone(&out);
        let sink = move |s: &str, more: bool| sink_out.lock().unwrap().push((s.to_string(), more));
        (out, sink)
    }

    #[test]
    fn refused_while_enabled_but_sink_called() {
        let log = TraceLog::new(TraceLogConfig::default()).unwrap();
        log.enable(CategoryFilter::record_all(), CaptureMode::Recording);
        let (out, sink) = collect();
        assert_eq!(log.flush(sink, false).unwrap_err(), FlushError::CaptureEnabled);
        assert_eq!(*out.lock().unwrap(), vec![(String::new(), false)]);
        assert!(log.is_flush_idle());
    }

    #[test]
    fn empty_flush_calls_sink_once_and_bumps_generation() {
        let log = TraceLog::new(TraceLogConfig::default()).unwrap();
        let before = log.generation();
        let (out, sink) = collect();
        let report = log.flush(sink, false).unwrap().wait().unwrap();
        assert_eq!(report.generation, before);
        assert_eq!(report.events, 0);
        assert_eq!(report.fragments, 1);
        assert_eq!(log.generation(), before.next());
        assert_eq!(*out.lock().unwrap(), vec![(String::new(), false)]);
        assert_eq!(log.metrics().flushes, 1);
        assert!(log.is_flush_idle());
    }

    #[test]
    fn process_name_metadata_is_emitted() {
        let log = TraceLog::new(TraceLogConfig::default()).unwrap();
        log.set_process_name("renderer");
        let (out, sink) = collect();
        let report = log.flush(sink, false).unwrap().wait().unwrap();
        assert_eq!(report.events, 1);
        let text = out.lock().unwrap()[0].0.clone();
        assert!(text.contains("\"name\":\"process_name\""));
        assert!(text.contains("\"renderer\""));
        assert!(text.contains("\"cat\":\"__metadata\""));
    }

    #[test]
    fn background_flush_completes() {
        let log = TraceLog::new(TraceLogConfig::default()).unwrap();
        let (out, sink) = collect();
        let handle = log.flush(sink, true).unwrap();
        let report = handle.wait().unwrap();
        assert_eq!(report.fragments, 1);
        assert_eq!(out.lock().unwrap().len(), 1);
    }

    #[test]
    fn panicking_sink_is_reported() {
        let log = TraceLog::new(TraceLogConfig::default()).unwrap();
        let handle = log
            .flush(|_: &str, _: bool| panic!("sink failure"), true)
            .unwrap();
        assert_eq!(handle.wait().unwrap_err(), FlushError::FlushThreadPanicked);
        assert!(log.is_flush_idle());
    }

    #[test]
    fn error_display() {
        assert_eq!(
            FlushError::ThreadSpawnFailed {
                reason: "no threads".into()
            }
            .to_string(),
            "failed to spawn flush thread: no threads"
        );
    }
}
