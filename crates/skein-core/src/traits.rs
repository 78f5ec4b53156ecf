//! Collaborator seams: event serialization and drain output.

use crate::event::EventRecord;

/// Per-event context handed to an [`EventFormatter`].
#[derive(Clone, Copy, Debug)]
pub struct FormatContext<'a> {
    /// Name of the event's category group.
    pub category: &'a str,
    /// Serialize without arguments (argument filtering rejected the event).
    pub strip_args: bool,
}

/// Serializes one event into an output buffer.
///
/// Implementations append exactly one self-contained item to `out`; the
/// drain inserts separators between items and never splits an item
/// across fragments.
pub trait EventFormatter: Send + Sync + 'static {
    /// Append the serialized form of `event` to `out`.
    fn format_event(&self, event: &EventRecord, ctx: &FormatContext<'_>, out: &mut String);
}

/// Receives drained output in fragments.
///
/// `has_more` is `false` on the final fragment, which may be empty.
pub trait DrainSink: Send {
    /// Deliver one fragment.
    fn write_fragment(&mut self, fragment: &str, has_more: bool);
}

impl<F> DrainSink for F
where
    F: FnMut(&str, bool) + Send,
{
    fn write_fragment(&mut self, fragment: &str, has_more: bool) {
        self(fragment, has_more)
    }
}
