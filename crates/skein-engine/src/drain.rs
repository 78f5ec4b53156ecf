//! Serialization of chunks into bounded fragments.

use skein_arena::Chunk;
use skein_core::{DrainSink, EventFormatter, FormatContext};

use crate::observer::ArgumentPredicate;
use crate::registry::CategoryRegistry;

/// Name used for events whose category index does not resolve.
const UNKNOWN_CATEGORY: &str = "__unknown";

/// Everything the drain needs besides the chunks and the sink.
pub(crate) struct DrainContext<'a> {
    pub(crate) registry: &'a CategoryRegistry,
    pub(crate) formatter: &'a dyn EventFormatter,
    pub(crate) max_fragment_bytes: usize,
    /// Set only when the session asked for argument filtering.
    pub(crate) arg_predicate: Option<&'a ArgumentPredicate>,
}

/// Counts from one drain.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct DrainStats {
    pub(crate) events: usize,
    pub(crate) chunks: usize,
    pub(crate) fragments: usize,
}

/// Format every event in `chunks`, in order, and hand the output to
/// `sink` in comma-separated fragments.
///
/// A fragment never exceeds `max_fragment_bytes` unless it holds a
/// single oversized event; events are never split. The sink is called
/// at least once, and the last call carries `has_more == false`.
pub(crate) fn drain<'c>(
    chunks: impl IntoIterator<Item = &'c Chunk>,
    ctx: &DrainContext<'_>,
    sink: &mut dyn DrainSink,
) -> DrainStats {
    let mut stats = DrainStats::default();
    let mut fragment = String::new();
    let mut item = String::new();

    for chunk in chunks {
        stats.chunks += 1;
        for event in chunk.events() {
            let category = ctx
                .registry
                .name(event.category)
                .unwrap_or(UNKNOWN_CATEGORY);
            let strip_args = ctx
                .arg_predicate
                .is_some_and(|keep| !keep(category, &*event.name));
            let fctx = FormatContext {
                category,
                strip_args,
            };

            item.clear();
            ctx.formatter.format_event(event, &fctx, &mut item);
            stats.events += 1;

            if !fragment.is_empty() && fragment.len() + 1 + item.len() > ctx.max_fragment_bytes {
                sink.write_fragment(&fragment, true);
                stats.fragments += 1;
                fragment.clear();
            }
            if !fragment.is_empty() {
                fragment.push(',');
            }
            fragment.push_str(&item);
        }
    }

    sink.write_fragment(&fragment, false);
    stats.fragments += 1;
    stats
}
