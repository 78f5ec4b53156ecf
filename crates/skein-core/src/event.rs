//! Event records, argument values and the builder used at call sites.

use std::borrow::Cow;
use std::fmt;

use smallvec::SmallVec;

use crate::flags::EventFlags;
use crate::id::{CategoryIndex, TraceThreadId};

/// Maximum number of arguments stored inline in an [`EventRecord`].
///
/// Arguments beyond this bound are discarded when the record is built.
pub const MAX_ARGS: usize = 2;

// ── Phase ──────────────────────────────────────────────────────

/// The phase of a trace event, as understood by trace-event consumers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Start of a duration slice.
    Begin,
    /// End of a duration slice.
    End,
    /// A slice with its duration filled in on close.
    Complete,
    /// A point in time.
    Instant,
    /// One or more named counter values.
    Counter,
    /// Start of an async operation.
    AsyncBegin,
    /// Intermediate step of an async operation.
    AsyncStep,
    /// End of an async operation.
    AsyncEnd,
    /// Start of a flow arrow.
    FlowBegin,
    /// Intermediate flow point.
    FlowStep,
    /// End of a flow arrow.
    FlowEnd,
    /// Process/thread naming and other bookkeeping.
    Metadata,
    /// A sampled stack or value.
    Sample,
}

impl Phase {
    /// Single-character code used in serialized trace-event output.
    pub fn as_char(self) -> char {
        match self {
            Self::Begin => 'B',
            Self::End => 'E',
            Self::Complete => 'X',
            Self::Instant => 'i',
            Self::Counter => 'C',
            Self::AsyncBegin => 'b',
            Self::AsyncStep => 'n',
            Self::AsyncEnd => 'e',
            Self::FlowBegin => 's',
            Self::FlowStep => 't',
            Self::FlowEnd => 'f',
            Self::Metadata => 'M',
            Self::Sample => 'P',
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

// ── Arguments ──────────────────────────────────────────────────

/// A single argument value.
#[derive(Clone, Debug, PartialEq)]
pub enum ArgValue {
    /// Boolean.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Unsigned integer.
    Uint(u64),
    /// Floating point.
    Double(f64),
    /// String, borrowed when static.
    Str(Cow<'static, str>),
}

impl From<bool> for ArgValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for ArgValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for ArgValue {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<u64> for ArgValue {
    fn from(v: u64) -> Self {
        Self::Uint(v)
    }
}

impl From<u32> for ArgValue {
    fn from(v: u32) -> Self {
        Self::Uint(v.into())
    }
}

impl From<f64> for ArgValue {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<&'static str> for ArgValue {
    fn from(v: &'static str) -> Self {
        Self::Str(Cow::Borrowed(v))
    }
}

impl From<String> for ArgValue {
    fn from(v: String) -> Self {
        Self::Str(Cow::Owned(v))
    }
}

/// A named argument attached to an event.
#[derive(Clone, Debug, PartialEq)]
pub struct Arg {
    /// Argument name. Call sites pass literals.
    pub name: &'static str,
    /// Argument value.
    pub value: ArgValue,
}

impl Arg {
    /// Construct an argument from anything convertible to [`ArgValue`].
    pub fn new(name: &'static str, value: impl Into<ArgValue>) -> Self {
        Self {
            name,
            value: value.into(),
        }
    }
}

/// Inline argument list, bounded by [`MAX_ARGS`].
pub type Args = SmallVec<[Arg; MAX_ARGS]>;

// ── EventRecord ────────────────────────────────────────────────

/// One captured trace event.
///
/// Records live inside chunks and are overwritten in place when a ring
/// slot is reissued. Durations stay `None` until the event is closed.
#[derive(Clone, Debug, PartialEq)]
pub struct EventRecord {
    /// Nanoseconds since the owning log's clock origin.
    pub timestamp_ns: u64,
    /// Thread CPU time at capture, when the clock provides one.
    pub thread_timestamp_ns: Option<u64>,
    /// Wall duration, set by close.
    pub duration_ns: Option<u64>,
    /// Thread CPU duration, set by close.
    pub thread_duration_ns: Option<u64>,
    /// Event phase.
    pub phase: Phase,
    /// Category group the event was recorded under.
    pub category: CategoryIndex,
    /// Event name.
    pub name: Cow<'static, str>,
    /// Caller-supplied id for async/flow events.
    pub id: Option<u64>,
    /// Thread that captured the event.
    pub thread_id: TraceThreadId,
    /// Event flags.
    pub flags: EventFlags,
    /// Inline arguments.
    pub args: Args,
}

impl EventRecord {
    /// Fill in the durations of a [`Phase::Complete`] event.
    ///
    /// Timestamps earlier than the start are clamped to a zero duration.
    pub fn close(&mut self, end_ns: u64, thread_end_ns: Option<u64>) {
        self.duration_ns = Some(end_ns.saturating_sub(self.timestamp_ns));
        self.thread_duration_ns = match (self.thread_timestamp_ns, thread_end_ns) {
            (Some(start), Some(end)) => Some(end.saturating_sub(start)),
            _ => None,
        };
    }

    /// Whether a duration has been recorded.
    pub fn is_closed(&self) -> bool {
        self.duration_ns.is_some()
    }
}

// ── EventBuilder ───────────────────────────────────────────────

/// Call-site description of an event, before it is stamped with a
/// category, thread and timestamp.
#[derive(Clone, Debug)]
pub struct EventBuilder {
    phase: Phase,
    name: Cow<'static, str>,
    id: Option<u64>,
    flags: EventFlags,
    args: Args,
    timestamp_ns: Option<u64>,
    thread_timestamp_ns: Option<u64>,
}

impl EventBuilder {
    /// Start describing an event with the given phase and name.
    pub fn new(phase: Phase, name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            phase,
            name: name.into(),
            id: None,
            flags: EventFlags::NONE,
            args: Args::new(),
            timestamp_ns: None,
            thread_timestamp_ns: None,
        }
    }

    /// A [`Phase::Complete`] event.
    pub fn complete(name: impl Into<Cow<'static, str>>) -> Self {
        Self::new(Phase::Complete, name)
    }

    /// A [`Phase::Instant`] event.
    pub fn instant(name: impl Into<Cow<'static, str>>) -> Self {
        Self::new(Phase::Instant, name)
    }

    /// A [`Phase::Counter`] event.
    pub fn counter(name: impl Into<Cow<'static, str>>) -> Self {
        Self::new(Phase::Counter, name)
    }

    /// A [`Phase::Metadata`] event.
    pub fn metadata(name: impl Into<Cow<'static, str>>) -> Self {
        Self::new(Phase::Metadata, name)
    }

    /// Attach an id and set [`EventFlags::HAS_ID`].
    pub fn with_id(mut self, id: u64) -> Self {
        self.id = Some(id);
        self.flags |= EventFlags::HAS_ID;
        self
    }

    /// Attach an argument. Arguments past [`MAX_ARGS`] are discarded.
    pub fn with_arg(mut self, name: &'static str, value: impl Into<ArgValue>) -> Self {
        if self.args.len() < MAX_ARGS {
            self.args.push(Arg::new(name, value));
        }
        self
    }

    /// Attach a list of arguments, keeping at most [`MAX_ARGS`].
    pub fn with_args(mut self, args: impl IntoIterator<Item = Arg>) -> Self {
        let room = MAX_ARGS - self.args.len();
        self.args.extend(args.into_iter().take(room));
        self
    }

    /// Use an explicit timestamp instead of reading the clock.
    pub fn with_timestamp(mut self, timestamp_ns: u64) -> Self {
        self.timestamp_ns = Some(timestamp_ns);
        self
    }

    /// Use an explicit thread-clock timestamp.
    pub fn with_thread_timestamp(mut self, thread_timestamp_ns: u64) -> Self {
        self.thread_timestamp_ns = Some(thread_timestamp_ns);
        self
    }

    /// Add event flags.
    pub fn with_flags(mut self, flags: EventFlags) -> Self {
        self.flags |= flags;
        self
    }

    /// The phase this builder will produce.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The event name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stamp the description into a record.
    ///
    /// Explicit timestamps set on the builder take precedence over
    /// `now_ns` / `thread_now_ns`.
    pub fn build(
        self,
        category: CategoryIndex,
        thread_id: TraceThreadId,
        now_ns: u64,
        thread_now_ns: Option<u64>,
    ) -> EventRecord {
        EventRecord {
            timestamp_ns: self.timestamp_ns.unwrap_or(now_ns),
            thread_timestamp_ns: self.thread_timestamp_ns.or(thread_now_ns),
            duration_ns: None,
            thread_duration_ns: None,
            phase: self.phase,
            category,
            name: self.name,
            id: self.id,
            thread_id,
            flags: self.flags,
            args: self.args,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stamp(builder: EventBuilder) -> EventRecord {
        builder.build(CategoryIndex(4), TraceThreadId(9), 1_000, Some(50))
    }

    #[test]
    fn extra_args_are_discarded() {
        let rec = stamp(
            EventBuilder::instant("tick")
                .with_arg("a", 1i64)
                .with_arg("b", true)
                .with_arg("c", "dropped"),
        );
        assert_eq!(rec.args.len(), MAX_ARGS);
        assert_eq!(rec.args[0].name, "a");
        assert_eq!(rec.args[1].value, ArgValue::Bool(true));
    }

    #[test]
    fn with_args_respects_bound() {
        let rec = stamp(EventBuilder::counter("mem").with_args([
            Arg::new("x", 1u64),
            Arg::new("y", 2u64),
            Arg::new("z", 3u64),
        ]));
        assert_eq!(rec.args.len(), 2);
        assert_eq!(rec.args[1].name, "y");
    }

    #[test]
    fn explicit_timestamp_wins() {
        let rec = stamp(EventBuilder::instant("t").with_timestamp(7));
        assert_eq!(rec.timestamp_ns, 7);
        assert_eq!(rec.thread_timestamp_ns, Some(50));
    }

    #[test]
    fn with_id_sets_flag() {
        let rec = stamp(EventBuilder::new(Phase::AsyncBegin, "load").with_id(42));
        assert_eq!(rec.id, Some(42));
        assert!(rec.flags.contains(EventFlags::HAS_ID));
    }

    #[test]
    fn close_fills_durations() {
        let mut rec = stamp(EventBuilder::complete("work"));
        assert!(!rec.is_closed());
        rec.close(1_500, Some(80));
        assert_eq!(rec.duration_ns, Some(500));
        assert_eq!(rec.thread_duration_ns, Some(30));
        assert!(rec.is_closed());
    }

    #[test]
    fn close_before_start_clamps_to_zero() {
        let mut rec = stamp(EventBuilder::complete("work"));
        rec.close(10, None);
        assert_eq!(rec.duration_ns, Some(0));
        assert_eq!(rec.thread_duration_ns, None);
    }

    #[test]
    fn phase_codes() {
        assert_eq!(Phase::Complete.as_char(), 'X');
        assert_eq!(Phase::Metadata.to_string(), "M");
    }

    #[cfg(not(miri))]
    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn arg_count_never_exceeds_bound(
                n in 0usize..8,
                start in 0u64..1_000_000,
                end in 0u64..1_000_000,
            ) {
                let mut b = EventBuilder::complete("p").with_timestamp(start);
                for i in 0..n {
                    b = b.with_arg("k", i as u64);
                }
                let mut rec = b.build(CategoryIndex(0), TraceThreadId(1), 0, None);
                prop_assert_eq!(rec.args.len(), n.min(MAX_ARGS));
                rec.close(end, None);
                prop_assert_eq!(rec.duration_ns, Some(end.saturating_sub(start)));
            }
        }
    }
}
