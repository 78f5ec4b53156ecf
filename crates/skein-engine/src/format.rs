//! Trace-event JSON serialization.

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

use skein_core::{Arg, ArgValue, EventFlags, EventFormatter, EventRecord, FormatContext, Phase};

/// Writes events as trace-event JSON objects.
///
/// Timestamps and durations are emitted in microseconds, keeping the
/// nanosecond remainder as a fraction. The drain joins objects with
/// commas; the caller supplies the enclosing brackets.
#[derive(Clone, Debug)]
pub struct JsonFormatter {
    pid: u32,
}

impl JsonFormatter {
    /// Formatter stamping the current process id.
    pub fn new() -> Self {
        Self {
            pid: std::process::id(),
        }
    }

    /// Formatter stamping a fixed process id.
    pub fn with_pid(pid: u32) -> Self {
        Self { pid }
    }
}

impl Default for JsonFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl EventFormatter for JsonFormatter {
    fn format_event(&self, event: &EventRecord, ctx: &FormatContext<'_>, out: &mut String) {
        let view = JsonEvent::new(self.pid, event, ctx);
        let mut buf = std::mem::take(out).into_bytes();
        let start = buf.len();
        if let Err(e) = serde_json::to_writer(&mut buf, &view) {
            tracing::warn!(name = %event.name, error = %e, "trace event not serializable");
            buf.truncate(start);
        }
        *out = String::from_utf8(buf)
            .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned());
    }
}

// ── Borrowed event view ────────────────────────────────────────────

#[derive(Serialize)]
struct JsonEvent<'a> {
    pid: u32,
    tid: u64,
    ts: f64,
    ph: char,
    cat: &'a str,
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    dur: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tts: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tdur: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    s: Option<char>,
    args: JsonArgs<'a>,
}

impl<'a> JsonEvent<'a> {
    fn new(pid: u32, event: &'a EventRecord, ctx: &FormatContext<'a>) -> Self {
        let s = (event.phase == Phase::Instant).then(|| {
            if event.flags.contains(EventFlags::SCOPE_GLOBAL) {
                'g'
            } else if event.flags.contains(EventFlags::SCOPE_PROCESS) {
                'p'
            } else {
                't'
            }
        });
        Self {
            pid,
            tid: event.thread_id.0,
            ts: micros(event.timestamp_ns),
            ph: event.phase.as_char(),
            cat: ctx.category,
            name: &event.name,
            dur: event.duration_ns.map(micros),
            tts: event.thread_timestamp_ns.map(micros),
            tdur: event.thread_duration_ns.map(micros),
            id: event.id.map(|id| format!("0x{id:x}")),
            s,
            args: if ctx.strip_args {
                JsonArgs::Stripped
            } else {
                JsonArgs::List(&event.args)
            },
        }
    }
}

fn micros(ns: u64) -> f64 {
    ns as f64 / 1000.0
}

enum JsonArgs<'a> {
    Stripped,
    List(&'a [Arg]),
}

impl Serialize for JsonArgs<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Stripped => serializer.serialize_str("__stripped__"),
            Self::List(args) => {
                let mut map = serializer.serialize_map(Some(args.len()))?;
                for arg in args.iter() {
                    map.serialize_entry(arg.name, &JsonValue(&arg.value))?;
                }
                map.end()
            }
        }
    }
}

/// Argument value; non-finite doubles become strings since JSON has no
/// representation for them.
struct JsonValue<'a>(&'a ArgValue);

impl Serialize for JsonValue<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            ArgValue::Bool(b) => serializer.serialize_bool(*b),
            ArgValue::Int(v) => serializer.serialize_i64(*v),
            ArgValue::Uint(v) => serializer.serialize_u64(*v),
            ArgValue::Double(v) if v.is_nan() => serializer.serialize_str("NaN"),
            ArgValue::Double(v) if v.is_infinite() => {
                serializer.serialize_str(if *v > 0.0 { "Infinity" } else { "-Infinity" })
            }
            ArgValue::Double(v) => serializer.serialize_f64(*v),
            ArgValue::Str(s) => serializer.serialize_str(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skein_core::{CategoryIndex, EventBuilder, TraceThreadId};

    fn format(event: &EventRecord, strip_args: bool) -> String {
        let mut out = String::new();
        let ctx = FormatContext {
            category: "gpu",
            strip_args,
        };
        JsonFormatter::with_pid(7).format_event(event, &ctx, &mut out);
        out
    }

    #[test]
    fn complete_event_with_duration_and_args() {
        let mut ev = EventBuilder::complete("draw")
            .with_arg("frame", 3i64)
            .with_arg("label", "main")
            .build(CategoryIndex(3), TraceThreadId(2), 1_500, None);
        ev.close(4_250, None);
        assert_eq!(
            format(&ev, false),
            "{\"pid\":7,\"tid\":2,\"ts\":1.5,\"ph\":\"X\",\"cat\":\"gpu\",\"name\":\"draw\",\
             \"dur\":2.75,\"args\":{\"frame\":3,\"label\":\"main\"}}"
        );
    }

    #[test]
    fn instant_event_carries_scope_and_id() {
        let ev = EventBuilder::instant("mark")
            .with_id(255)
            .with_flags(EventFlags::SCOPE_GLOBAL)
            .build(CategoryIndex(3), TraceThreadId(1), 0, None);
        let s = format(&ev, false);
        assert!(s.contains("\"id\":\"0xff\""));
        assert!(s.contains("\"s\":\"g\""));
        assert!(s.ends_with("\"args\":{}}"));
    }

    #[test]
    fn stripped_args_are_replaced() {
        let ev = EventBuilder::counter("mem")
            .with_arg("bytes", 10u64)
            .build(CategoryIndex(3), TraceThreadId(1), 0, None);
        assert!(format(&ev, true).ends_with("\"args\":\"__stripped__\"}"));
    }

    #[test]
    fn strings_are_escaped() {
        let ev = EventBuilder::instant("a\"b\\c\nd\u{1}")
            .with_arg("k", "x\ty")
            .build(CategoryIndex(3), TraceThreadId(1), 0, None);
        let s = format(&ev, false);
        assert!(s.contains("\"name\":\"a\\\"b\\\\c\\nd\\u0001\""), "{s}");
        assert!(s.contains("\"k\":\"x\\ty\""), "{s}");
        let parsed: serde_json::Value = serde_json::from_str(&s).unwrap();
        assert_eq!(parsed["name"], "a\"b\\c\nd\u{1}");
    }

    #[test]
    fn non_finite_doubles_are_strings() {
        let ev = EventBuilder::counter("load")
            .with_arg("nan", f64::NAN)
            .with_arg("low", f64::NEG_INFINITY)
            .build(CategoryIndex(3), TraceThreadId(1), 0, None);
        assert!(format(&ev, false)
            .ends_with("\"args\":{\"nan\":\"NaN\",\"low\":\"-Infinity\"}}"));
    }

    #[test]
    fn sub_microsecond_timestamps_keep_fraction() {
        let mut ev = EventBuilder::complete("tiny").build(
            CategoryIndex(3),
            TraceThreadId(1),
            1,
            Some(2_500),
        );
        ev.close(251, Some(3_000));
        let parsed: serde_json::Value = serde_json::from_str(&format(&ev, false)).unwrap();
        assert_eq!(parsed["ts"], 0.001);
        assert_eq!(parsed["dur"], 0.25);
        assert_eq!(parsed["tts"], 2.5);
        assert_eq!(parsed["tdur"], 0.5);
    }
}
