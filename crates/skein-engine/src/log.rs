//! The [`TraceLog`] context object: construction, session control,
//! hooks and thread registration.
//!
//! The capture API and [`flush`](crate::flush) extend [`TraceLog`] with
//! further `impl` blocks over the same shared state.
//!
//! Lock order is session → registry → store → threads. Observer and
//! hook callbacks always run with every lock released.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, RwLock, RwLockReadGuard};

use indexmap::IndexMap;
use skein_arena::{ChunkStore, StoreConfig};
use skein_core::{
    CaptureMode, CategoryFlags, CategoryIndex, EventRecord, Generation, RecordMode,
    TraceThreadId,
};
use skein_filter::{CategoryFilter, MergeConflict};

use crate::config::{ConfigError, TraceLogConfig};
use crate::flush::FlushStateCell;
use crate::generation::GenerationCounter;
use crate::metrics::{MetricCounters, TraceMetrics};
use crate::observer::{ArgumentPredicate, EnabledStateObserver, EventCallback, EventExporter};
use crate::registry::{CategoryRef, CategoryRegistry};
use crate::thread::{self, CachedChunk, LogId, RegisteredThread};

static NEXT_LOG_ID: AtomicU64 = AtomicU64::new(1);

// ── Shared state ───────────────────────────────────────────────────

/// Session state guarded by the session lock.
pub(crate) struct Session {
    pub(crate) enabled_modes: CategoryFlags,
    pub(crate) filter: CategoryFilter,
    pub(crate) store_config: StoreConfig,
    pub(crate) callback_filter: Option<CategoryFilter>,
    pub(crate) exporter_filter: Option<CategoryFilter>,
    pub(crate) observers: Vec<Arc<dyn EnabledStateObserver>>,
    pub(crate) process_name: Option<String>,
    pub(crate) arg_predicate: Option<ArgumentPredicate>,
}

impl Session {
    fn new(config: &TraceLogConfig) -> Self {
        Self {
            enabled_modes: CategoryFlags::NONE,
            filter: CategoryFilter::default(),
            store_config: config.store_overrides.unwrap_or_default(),
            callback_filter: None,
            exporter_filter: None,
            observers: Vec::new(),
            process_name: None,
            arg_predicate: None,
        }
    }

    /// Flags a category group should carry under this session.
    pub(crate) fn flags_for(&self, group: &str) -> CategoryFlags {
        let mut flags = CategoryFlags::NONE;
        if self.enabled_modes.is_any() && self.filter.is_enabled(group) {
            flags |= self.enabled_modes;
        }
        if self.callback_filter.as_ref().is_some_and(|f| f.is_enabled(group)) {
            flags |= CategoryFlags::EVENT_CALLBACK;
        }
        if self.exporter_filter.as_ref().is_some_and(|f| f.is_enabled(group)) {
            flags |= CategoryFlags::EXPORT;
        }
        flags
    }

    /// Argument predicate to apply when draining, if the session asked
    /// for argument filtering.
    pub(crate) fn drain_predicate(&self) -> Option<ArgumentPredicate> {
        if self.filter.argument_filter_enabled() {
            self.arg_predicate.clone()
        } else {
            None
        }
    }
}

/// The active store and everything written alongside it.
pub(crate) struct StoreState {
    pub(crate) store: Box<dyn ChunkStore>,
    /// Chunk used by threads without a cache.
    pub(crate) shared: Option<CachedChunk>,
    /// Names emitted as `thread_name` metadata at flush.
    pub(crate) thread_names: IndexMap<TraceThreadId, String>,
    /// Timestamp of the first event refused by a full store.
    pub(crate) overflowed_at: Option<u64>,
}

impl StoreState {
    fn new(config: &StoreConfig) -> Self {
        Self {
            store: config.build(),
            shared: None,
            thread_names: IndexMap::new(),
            overflowed_at: None,
        }
    }

    pub(crate) fn note_overflow(&mut self, timestamp_ns: u64) {
        self.overflowed_at.get_or_insert(timestamp_ns);
    }
}

#[derive(Default)]
pub(crate) struct Hooks {
    pub(crate) callback: Option<EventCallback>,
    pub(crate) exporter: Option<Arc<dyn EventExporter>>,
}

pub(crate) struct LogInner {
    pub(crate) id: LogId,
    pub(crate) config: TraceLogConfig,
    pub(crate) registry: CategoryRegistry,
    pub(crate) session: Mutex<Session>,
    pub(crate) store: Mutex<StoreState>,
    pub(crate) threads: Mutex<IndexMap<TraceThreadId, RegisteredThread>>,
    pub(crate) hooks: RwLock<Hooks>,
    pub(crate) generation: GenerationCounter,
    pub(crate) flush_state: FlushStateCell,
    pub(crate) echo: AtomicBool,
    pub(crate) metrics: MetricCounters,
}

impl LogInner {
    pub(crate) fn lock_session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn lock_store(&self) -> MutexGuard<'_, StoreState> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn lock_threads(&self) -> MutexGuard<'_, IndexMap<TraceThreadId, RegisteredThread>> {
        self.threads.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn read_hooks(&self) -> RwLockReadGuard<'_, Hooks> {
        self.hooks.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn update_hooks(&self, f: impl FnOnce(&mut Hooks)) {
        f(&mut self.hooks.write().unwrap_or_else(PoisonError::into_inner));
    }

    fn recompute_flags(&self, session: &Session) {
        self.registry.recompute_all(|group| session.flags_for(group));
    }

    /// Replace the active store with an empty one built from `config`.
    ///
    /// Cached chunks of the old store are discarded by their threads on
    /// their next write. Call with the session lock held.
    fn swap_store(&self, config: &StoreConfig) {
        let mut st = self.lock_store();
        st.store = config.build();
        st.shared = None;
        st.overflowed_at = None;
        let generation = self.generation.advance();
        tracing::debug!(
            %generation,
            kind = %config.kind,
            max_chunks = config.max_chunks,
            chunk_capacity = config.chunk_capacity,
            "swapped chunk store"
        );
    }
}

// ── TraceLog ───────────────────────────────────────────────────────

/// A trace-event capture engine.
///
/// `TraceLog` is a cheap handle around shared state; clones refer to the
/// same log. Independent logs built with [`TraceLog::new`] share
/// nothing. [`TraceLog::global`] returns a lazily constructed
/// process-wide instance.
///
/// Capture is off until [`enable`](Self::enable) is called. Events are
/// written into chunks, either through a per-thread cache (after
/// [`register_current_thread`](Self::register_current_thread)) or
/// through one shared chunk under the store lock, and collected by
/// [`flush`](Self::flush).
#[derive(Clone)]
pub struct TraceLog {
    pub(crate) inner: Arc<LogInner>,
}

// Compile-time assertion: TraceLog must be Send + Sync.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<TraceLog>();
};

/// Outcome of [`TraceLog::enable`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnableReport {
    /// The filter now in effect.
    pub filter: CategoryFilter,
    /// Options of the requested filter that lost to the active session.
    pub conflicts: Vec<MergeConflict>,
    /// Whether a new store was swapped in.
    pub store_swapped: bool,
    /// Generation after the call.
    pub generation: Generation,
}

impl TraceLog {
    /// Create a log after validating `config`.
    pub fn new(config: TraceLogConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::with_valid_config(config))
    }

    fn with_valid_config(config: TraceLogConfig) -> Self {
        let session = Session::new(&config);
        let store = StoreState::new(&session.store_config);
        Self {
            inner: Arc::new(LogInner {
                id: NEXT_LOG_ID.fetch_add(1, Ordering::Relaxed),
                registry: CategoryRegistry::new(config.max_category_groups),
                session: Mutex::new(session),
                store: Mutex::new(store),
                threads: Mutex::new(IndexMap::new()),
                hooks: RwLock::new(Hooks::default()),
                generation: GenerationCounter::new(),
                flush_state: FlushStateCell::new(),
                echo: AtomicBool::new(false),
                metrics: MetricCounters::default(),
                config,
            }),
        }
    }

    /// The process-wide log, built with the default configuration on
    /// first use.
    pub fn global() -> &'static TraceLog {
        static GLOBAL: OnceLock<TraceLog> = OnceLock::new();
        GLOBAL.get_or_init(|| Self::with_valid_config(TraceLogConfig::default()))
    }

    /// The configuration this log was built with.
    pub fn config(&self) -> &TraceLogConfig {
        &self.inner.config
    }

    /// The category registry.
    pub fn registry(&self) -> &CategoryRegistry {
        &self.inner.registry
    }

    // ── Categories ─────────────────────────────────────────────────

    /// Resolve a category group, registering it on first use.
    ///
    /// The returned reference is valid for the lifetime of the log and
    /// should be cached at the call site. Its flags track the session.
    pub fn category(&self, group: &str) -> CategoryRef<'_> {
        let registry = &self.inner.registry;
        if let Some(found) = registry.get(group) {
            return found;
        }
        // Hooks run with the guard already raised and no lock held, so a
        // category first seen there still gets the session's flags.
        let _guard = thread::enter_engine();
        let session = self.inner.lock_session();
        registry.get_or_create(group, |name| session.flags_for(name))
    }

    /// Whether any consumer is interested in `group`.
    pub fn is_category_enabled(&self, group: &str) -> bool {
        self.category(group).is_enabled()
    }

    /// Name of the category at `index`.
    pub fn category_name(&self, index: CategoryIndex) -> Option<&str> {
        self.inner.registry.name(index)
    }

    // ── Session control ────────────────────────────────────────────

    /// Start capturing in `mode` with `filter`.
    ///
    /// While a session is already active the filters are merged: the
    /// active record mode, sampling and argument-filter settings win and
    /// each disagreement is reported and logged. Starting a session from
    /// the disabled state swaps in a fresh store when the record mode
    /// calls for a different one.
    pub fn enable(&self, filter: CategoryFilter, mode: CaptureMode) -> EnableReport {
        let inner = &self.inner;
        let (report, observers) = {
            let mut session = inner.lock_session();
            let was_enabled = session.enabled_modes.is_any();

            let conflicts = if was_enabled {
                let conflicts = session.filter.merge(&filter);
                for conflict in &conflicts {
                    tracing::warn!(%conflict, "filter option ignored; active session keeps its setting");
                }
                conflicts
            } else {
                session.filter = filter;
                Vec::new()
            };
            session.enabled_modes |= mode.flag();

            let mut store_swapped = false;
            if !was_enabled {
                let wanted = inner
                    .config
                    .store_overrides
                    .unwrap_or_else(|| StoreConfig::for_record_mode(session.filter.record_mode()));
                if wanted != session.store_config {
                    inner.swap_store(&wanted);
                    session.store_config = wanted;
                    store_swapped = true;
                }
            }

            inner.echo.store(
                session.filter.record_mode() == RecordMode::EchoToConsole,
                Ordering::Release,
            );
            inner.recompute_flags(&session);

            tracing::debug!(
                %mode,
                filter = %session.filter,
                record_mode = %session.filter.record_mode(),
                "capture enabled"
            );

            let report = EnableReport {
                filter: session.filter.clone(),
                conflicts,
                store_swapped,
                generation: inner.generation.current(),
            };
            let observers = if was_enabled {
                Vec::new()
            } else {
                session.observers.clone()
            };
            (report, observers)
        };

        let _guard = thread::enter_engine();
        for observer in observers {
            observer.on_enabled();
        }
        report
    }

    /// Stop capturing. Buffered events stay in the store until flushed.
    pub fn disable(&self) {
        let inner = &self.inner;
        let observers = {
            let mut session = inner.lock_session();
            if !session.enabled_modes.is_any() {
                return;
            }
            session.enabled_modes = CategoryFlags::NONE;
            inner.echo.store(false, Ordering::Release);
            inner.recompute_flags(&session);
            tracing::debug!("capture disabled");
            session.observers.clone()
        };

        let _guard = thread::enter_engine();
        for observer in observers {
            observer.on_disabled();
        }
    }

    /// Whether any capture mode is active.
    pub fn is_enabled(&self) -> bool {
        self.inner.lock_session().enabled_modes.is_any()
    }

    /// The capture modes currently active.
    pub fn enabled_modes(&self) -> CategoryFlags {
        self.inner.lock_session().enabled_modes
    }

    /// The filter of the current (or most recent) session.
    pub fn current_filter(&self) -> CategoryFilter {
        self.inner.lock_session().filter.clone()
    }

    /// The current store generation.
    pub fn generation(&self) -> Generation {
        self.inner.generation.current()
    }

    /// Estimated fill ratio of the active store, in `[0, 1]`.
    ///
    /// Counts whole issued chunks, so it over-reports partially written
    /// ones.
    pub fn buffer_usage(&self) -> f64 {
        let st = self.inner.lock_store();
        let capacity = st.store.capacity();
        if capacity == 0 {
            return 0.0;
        }
        (st.store.used_estimate() as f64 / capacity as f64).min(1.0)
    }

    // ── Hooks ──────────────────────────────────────────────────────

    /// Call `callback` with every event whose category matches `filter`,
    /// as it is added, whether or not capture is enabled.
    pub fn set_event_callback<F>(&self, filter: CategoryFilter, callback: F)
    where
        F: Fn(&EventRecord, &str) + Send + Sync + 'static,
    {
        self.inner
            .update_hooks(|hooks| hooks.callback = Some(Arc::new(callback)));
        let mut session = self.inner.lock_session();
        session.callback_filter = Some(filter);
        self.inner.recompute_flags(&session);
    }

    /// Remove the event callback.
    pub fn clear_event_callback(&self) {
        {
            let mut session = self.inner.lock_session();
            session.callback_filter = None;
            self.inner.recompute_flags(&session);
        }
        self.inner.update_hooks(|hooks| hooks.callback = None);
    }

    /// Hand every event whose category matches `filter` to `exporter`.
    pub fn set_exporter(&self, filter: CategoryFilter, exporter: Arc<dyn EventExporter>) {
        self.inner
            .update_hooks(|hooks| hooks.exporter = Some(exporter));
        let mut session = self.inner.lock_session();
        session.exporter_filter = Some(filter);
        self.inner.recompute_flags(&session);
    }

    /// Remove the exporter.
    pub fn clear_exporter(&self) {
        {
            let mut session = self.inner.lock_session();
            session.exporter_filter = None;
            self.inner.recompute_flags(&session);
        }
        self.inner.update_hooks(|hooks| hooks.exporter = None);
    }

    /// Register an observer of enable/disable transitions.
    pub fn add_enabled_state_observer(&self, observer: Arc<dyn EnabledStateObserver>) {
        self.inner.lock_session().observers.push(observer);
    }

    /// Unregister an observer. Returns `false` if it was not registered.
    pub fn remove_enabled_state_observer(&self, observer: &Arc<dyn EnabledStateObserver>) -> bool {
        let mut session = self.inner.lock_session();
        let before = session.observers.len();
        session
            .observers
            .retain(|o| !std::ptr::addr_eq(Arc::as_ptr(o), Arc::as_ptr(observer)));
        session.observers.len() != before
    }

    /// Predicate deciding which `(category, name)` pairs keep their
    /// arguments in flushed output when the session's filter enables
    /// argument filtering.
    pub fn set_argument_filter<F>(&self, predicate: F)
    where
        F: Fn(&str, &str) -> bool + Send + Sync + 'static,
    {
        self.inner.lock_session().arg_predicate = Some(Arc::new(predicate));
    }

    /// Name emitted as `process_name` metadata at flush.
    pub fn set_process_name(&self, name: impl Into<String>) {
        self.inner.lock_session().process_name = Some(name.into());
    }

    // ── Threads ────────────────────────────────────────────────────

    /// Give the calling thread a private chunk cache for this log.
    ///
    /// Registered threads write without taking the store lock. A flush
    /// waits (up to the flush timeout) for each registered thread that
    /// holds a chunk to surrender it; long-idle threads should call
    /// [`service_current_thread`](Self::service_current_thread)
    /// periodically. Registering again only renames the thread.
    pub fn register_current_thread(&self, name: impl Into<String>) -> TraceThreadId {
        let inner = &self.inner;
        let id = thread::current_thread_id();
        let name = name.into();
        let (requests_tx, requests_rx) = crossbeam_channel::unbounded();
        let holds_chunk = Arc::new(AtomicBool::new(false));

        if thread::install_cache(
            inner.id,
            Arc::downgrade(inner),
            requests_rx,
            Arc::clone(&holds_chunk),
        ) {
            inner.lock_threads().insert(
                id,
                RegisteredThread {
                    name: name.clone(),
                    requests: requests_tx,
                    holds_chunk,
                },
            );
            tracing::trace!(thread_id = %id, thread = %name, "registered thread");
        } else if let Some(registered) = inner.lock_threads().get_mut(&id) {
            registered.name.clone_from(&name);
        }
        inner.lock_store().thread_names.insert(id, name);
        id
    }

    /// Drop the calling thread's cache, returning its chunk to the store.
    ///
    /// Returns `false` if the thread was not registered.
    pub fn unregister_current_thread(&self) -> bool {
        match thread::remove_cache(self.inner.id) {
            Some(cache) => {
                self.inner.retire_cache(thread::current_thread_id(), cache);
                true
            }
            None => false,
        }
    }

    /// Answer pending flush requests on the calling thread without
    /// writing an event. Returns how many were answered.
    pub fn service_current_thread(&self) -> usize {
        let inner = &self.inner;
        let id = thread::current_thread_id();
        thread::with_cache(inner.id, |cache| {
            cache.sync_generation(id, inner.generation.current(), &inner.metrics)
        })
        .unwrap_or(0)
    }

    // ── Diagnostics ────────────────────────────────────────────────

    /// Snapshot of the degradation counters.
    pub fn metrics(&self) -> TraceMetrics {
        self.inner.metrics.snapshot()
    }

    /// Return the log to its freshly constructed state.
    ///
    /// Capture is disabled, hooks and observers are removed, the store
    /// is replaced and counters are cleared. Registered categories keep
    /// their indices but lose their flags.
    pub fn reset_for_testing(&self) {
        let inner = &self.inner;
        let mut session = inner.lock_session();
        *session = Session::new(&inner.config);
        inner.echo.store(false, Ordering::Release);
        inner.recompute_flags(&session);
        {
            let mut st = inner.lock_store();
            *st = StoreState::new(&session.store_config);
            inner.generation.advance();
        }
        drop(session);
        inner.update_hooks(|hooks| *hooks = Hooks::default());
        inner.metrics.reset();
    }
}

impl fmt::Debug for TraceLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraceLog")
            .field("id", &self.inner.id)
            .field("generation", &self.inner.generation.current())
            .field("registry", &self.inner.registry)
            .finish_non_exhaustive()
    }
}
