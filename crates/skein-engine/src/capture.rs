//! The capture hot path: building records, dispatching them to hooks,
//! and writing them into chunks.

use std::borrow::Cow;

use skein_core::{
    Arg, CategoryFlags, EventBuilder, EventFlags, EventHandle, EventRecord, Phase, TraceThreadId,
};

use crate::log::{LogInner, TraceLog};
use crate::metrics::MetricCounters;
use crate::registry::CategoryRef;
use crate::thread::{self, CachedChunk, ThreadCache};

/// Attempts at writing through a thread cache before falling back to
/// the shared chunk. Each retry means a store swap raced the write.
const CACHED_WRITE_ATTEMPTS: usize = 3;

impl LogInner {
    /// Record `builder` under `category`. Returns a handle when the event
    /// was written into a chunk.
    pub(crate) fn add(&self, category: CategoryRef<'_>, builder: EventBuilder) -> Option<EventHandle> {
        let flags = category.flags();
        if !flags.is_any() {
            return None;
        }
        let Some(_guard) = thread::enter_engine() else {
            MetricCounters::bump(&self.metrics.events_dropped_reentrant);
            return None;
        };

        let thread_id = thread::current_thread_id();
        let clock = &self.config.clock;
        let record = builder.build(
            category.index(),
            thread_id,
            clock.now_ns(),
            clock.thread_now_ns(),
        );
        self.dispatch(flags, &record, category.name());

        if !flags.intersects(CategoryFlags::CAPTURE) {
            return None;
        }
        self.write(thread_id, record)
    }

    /// Hand `record` to the callback, the exporter and the echo log as
    /// its category's flags ask.
    fn dispatch(&self, flags: CategoryFlags, record: &EventRecord, category: &str) {
        if flags.intersects(CategoryFlags::EVENT_CALLBACK | CategoryFlags::EXPORT) {
            let (callback, exporter) = {
                let hooks = self.read_hooks();
                (hooks.callback.clone(), hooks.exporter.clone())
            };
            if flags.contains(CategoryFlags::EVENT_CALLBACK) {
                if let Some(callback) = callback {
                    callback(record, category);
                }
            }
            if flags.contains(CategoryFlags::EXPORT) {
                if let Some(exporter) = exporter {
                    exporter.export(record, category);
                }
            }
        }
        if flags.intersects(CategoryFlags::CAPTURE)
            && self.echo.load(std::sync::atomic::Ordering::Acquire)
        {
            tracing::info!(
                target: "skein::echo",
                category,
                phase = %record.phase,
                tid = %record.thread_id,
                ts_ns = record.timestamp_ns,
                dur_ns = record.duration_ns,
                "{}",
                record.name
            );
        }
    }

    fn write(&self, thread_id: TraceThreadId, record: EventRecord) -> Option<EventHandle> {
        let mut pending = Some(record);
        let handle = thread::with_cache(self.id, |cache| {
            self.write_cached(cache, thread_id, &mut pending)
        })
        .flatten();
        match pending {
            None => handle,
            Some(record) => self.write_shared(thread_id, record),
        }
    }

    /// Write through the calling thread's cache.
    ///
    /// Takes the record out of `pending` once it is written or dropped;
    /// leaves it in place if every attempt lost a race with a store swap.
    fn write_cached(
        &self,
        cache: &mut ThreadCache,
        thread_id: TraceThreadId,
        pending: &mut Option<EventRecord>,
    ) -> Option<EventHandle> {
        for _ in 0..CACHED_WRITE_ATTEMPTS {
            let generation = self.generation.current();
            cache.sync_generation(thread_id, generation, &self.metrics);

            if let Some(cached) = cache.chunk_mut() {
                if !cached.chunk.is_full() {
                    let record = pending.take()?;
                    return self.push(cached, record);
                }
            }

            let mut guard = self.lock_store();
            if self.generation.current() != generation {
                continue;
            }
            let st = &mut *guard;
            if let Some(full) = cache.take_chunk() {
                tracing::trace!(seq = %full.chunk.seq(), "returning full chunk");
                st.store.release_chunk(full.index, full.chunk);
            }

            let record = pending.take()?;
            if st.store.is_full() && record.phase != Phase::Metadata {
                st.note_overflow(record.timestamp_ns);
                MetricCounters::bump(&self.metrics.events_dropped_full);
                return None;
            }
            let Some((index, chunk)) = st.store.acquire_chunk() else {
                MetricCounters::bump(&self.metrics.events_dropped_no_chunk);
                return None;
            };
            let mut cached = CachedChunk {
                index,
                chunk,
                generation,
            };
            let handle = self.push(&mut cached, record);
            cache.set_chunk(cached);
            return handle;
        }
        None
    }

    /// Write through the shared chunk under the store lock.
    fn write_shared(&self, thread_id: TraceThreadId, mut record: EventRecord) -> Option<EventHandle> {
        record.flags |= EventFlags::SHARED_CHUNK;

        let mut guard = self.lock_store();
        let st = &mut *guard;
        if thread_id != TraceThreadId(0) && !st.thread_names.contains_key(&thread_id) {
            if let Some(name) = std::thread::current().name() {
                st.thread_names.insert(thread_id, name.to_string());
            }
        }

        if let Some(shared) = st.shared.as_mut() {
            if !shared.chunk.is_full() {
                return self.push(shared, record);
            }
        }
        if let Some(full) = st.shared.take() {
            tracing::trace!(seq = %full.chunk.seq(), "returning full shared chunk");
            st.store.release_chunk(full.index, full.chunk);
        }

        if st.store.is_full() && record.phase != Phase::Metadata {
            st.note_overflow(record.timestamp_ns);
            MetricCounters::bump(&self.metrics.events_dropped_full);
            return None;
        }
        let Some((index, chunk)) = st.store.acquire_chunk() else {
            MetricCounters::bump(&self.metrics.events_dropped_no_chunk);
            return None;
        };
        let shared = st.shared.insert(CachedChunk {
            index,
            chunk,
            generation: self.generation.current(),
        });
        self.push(shared, record)
    }

    fn push(&self, cached: &mut CachedChunk, record: EventRecord) -> Option<EventHandle> {
        match cached.chunk.push(record) {
            Some(event_index) => {
                MetricCounters::bump(&self.metrics.events_recorded);
                Some(cached.handle(event_index))
            }
            None => {
                MetricCounters::bump(&self.metrics.events_dropped_no_chunk);
                None
            }
        }
    }

    /// Fill in the duration of the event at `handle`.
    ///
    /// Looks in the calling thread's cached chunk, then the shared chunk,
    /// then the active store. A handle whose chunk was reissued, retired
    /// or is cached by another thread no longer resolves; the close is
    /// dropped and counted.
    pub(crate) fn close(&self, handle: EventHandle, end_ns: u64, thread_end_ns: Option<u64>) -> bool {
        let closed = handle.is_valid() && self.try_close(&handle, end_ns, thread_end_ns);
        if !closed {
            MetricCounters::bump(&self.metrics.stale_closes);
        }
        closed
    }

    fn try_close(&self, handle: &EventHandle, end_ns: u64, thread_end_ns: Option<u64>) -> bool {
        let close_in = |event: Option<&mut EventRecord>| match event {
            Some(event) => {
                event.close(end_ns, thread_end_ns);
                true
            }
            None => false,
        };

        let own = thread::with_cache(self.id, |cache| match cache.chunk_mut() {
            Some(cached) if cached.owns(handle) => {
                Some(close_in(cached.chunk.event_mut(handle.event_index())))
            }
            _ => None,
        })
        .flatten();
        if let Some(closed) = own {
            return closed;
        }

        let mut guard = self.lock_store();
        let st = &mut *guard;
        if let Some(shared) = st.shared.as_mut() {
            if shared.owns(handle) {
                return close_in(shared.chunk.event_mut(handle.event_index()));
            }
        }
        if handle.generation() != self.generation.current() {
            return false;
        }
        match st.store.chunk_mut(handle.chunk_index()) {
            Some(chunk) if chunk.seq() == handle.chunk_seq() => {
                close_in(chunk.event_mut(handle.event_index()))
            }
            _ => false,
        }
    }
}

// ── TraceLog capture API ───────────────────────────────────────────

impl TraceLog {
    /// Record an event described by `builder` under `category`.
    ///
    /// Returns a handle when the event was written into a chunk, which
    /// requires a capture mode to be enabled for the category. Events
    /// that only reach the callback or exporter return `None`.
    ///
    /// `category` must have been resolved by this log.
    #[inline]
    pub fn add_event(&self, category: CategoryRef<'_>, builder: EventBuilder) -> Option<EventHandle> {
        self.inner.add(category, builder)
    }

    /// Open a complete event; close it with [`end_event`](Self::end_event).
    pub fn begin_event(
        &self,
        category: CategoryRef<'_>,
        name: impl Into<Cow<'static, str>>,
        id: Option<u64>,
        args: impl IntoIterator<Item = Arg>,
    ) -> Option<EventHandle> {
        let mut builder = EventBuilder::complete(name).with_args(args);
        if let Some(id) = id {
            builder = builder.with_id(id);
        }
        self.add_event(category, builder)
    }

    /// Close the event opened by [`begin_event`](Self::begin_event) at the
    /// current time.
    ///
    /// The callback, exporter and echo log see a matching end event.
    /// Returns whether a buffered event was updated.
    pub fn end_event(
        &self,
        category: CategoryRef<'_>,
        name: impl Into<Cow<'static, str>>,
        handle: EventHandle,
    ) -> bool {
        let inner = &*self.inner;
        let flags = category.flags();
        if !flags.is_any() {
            return false;
        }
        let Some(_guard) = thread::enter_engine() else {
            MetricCounters::bump(&inner.metrics.events_dropped_reentrant);
            return false;
        };

        let clock = &inner.config.clock;
        let now = clock.now_ns();
        let thread_now = clock.thread_now_ns();
        let closed = flags.intersects(CategoryFlags::CAPTURE) && inner.close(handle, now, thread_now);

        let end = EventBuilder::new(Phase::End, name).build(
            category.index(),
            thread::current_thread_id(),
            now,
            thread_now,
        );
        inner.dispatch(flags, &end, category.name());
        closed
    }

    /// Record an instant event.
    pub fn add_instant_event(
        &self,
        category: CategoryRef<'_>,
        name: impl Into<Cow<'static, str>>,
        args: impl IntoIterator<Item = Arg>,
    ) -> Option<EventHandle> {
        self.add_event(category, EventBuilder::instant(name).with_args(args))
    }

    /// Record a counter sample; each argument is one series.
    pub fn add_counter(
        &self,
        category: CategoryRef<'_>,
        name: impl Into<Cow<'static, str>>,
        args: impl IntoIterator<Item = Arg>,
    ) -> Option<EventHandle> {
        self.add_event(category, EventBuilder::counter(name).with_args(args))
    }

    /// Record a metadata event. Metadata is accepted even when a grow
    /// store is full.
    pub fn add_metadata_event(
        &self,
        category: CategoryRef<'_>,
        name: impl Into<Cow<'static, str>>,
        args: impl IntoIterator<Item = Arg>,
    ) -> Option<EventHandle> {
        self.add_event(category, EventBuilder::metadata(name).with_args(args))
    }

    /// Set the end time of the event at `handle`.
    ///
    /// A no-op returning `false` if the handle's chunk has been reissued,
    /// retired by a flush, or is cached by another thread.
    pub fn close_event(&self, handle: EventHandle, end_ns: u64) -> bool {
        self.inner.close(handle, end_ns, None)
    }
}
