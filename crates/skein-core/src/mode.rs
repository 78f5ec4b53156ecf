//! Record modes (buffering strategy) and capture modes (session kind).

use std::fmt;

use crate::flags::CategoryFlags;

/// How the chunk store behaves once it has no free room.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum RecordMode {
    /// Grow until the capacity ceiling, then refuse ordinary events.
    #[default]
    RecordUntilFull,
    /// Reuse a fixed set of chunks circularly, dropping the oldest data.
    RecordContinuously,
    /// Like [`RecordUntilFull`](Self::RecordUntilFull) with a much larger ceiling.
    RecordAsMuchAsPossible,
    /// Small circular buffer; every admitted event is also echoed to the log.
    EchoToConsole,
}

impl RecordMode {
    /// Whether this mode reuses chunks circularly.
    pub fn is_circular(self) -> bool {
        matches!(self, Self::RecordContinuously | Self::EchoToConsole)
    }
}

impl fmt::Display for RecordMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::RecordUntilFull => "record-until-full",
            Self::RecordContinuously => "record-continuously",
            Self::RecordAsMuchAsPossible => "record-as-much-as-possible",
            Self::EchoToConsole => "trace-to-console",
        };
        f.write_str(s)
    }
}

/// The kind of capture session started by `enable()`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CaptureMode {
    /// Capture for a later flush that retires the store.
    Recording,
    /// Capture continuously for point-in-time snapshots.
    Monitoring,
}

impl CaptureMode {
    /// The category bit this mode sets on matching categories.
    pub fn flag(self) -> CategoryFlags {
        match self {
            Self::Recording => CategoryFlags::RECORDING,
            Self::Monitoring => CategoryFlags::MONITORING,
        }
    }
}

impl fmt::Display for CaptureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Recording => f.write_str("recording"),
            Self::Monitoring => f.write_str("monitoring"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn circular_modes() {
        assert!(RecordMode::RecordContinuously.is_circular());
        assert!(RecordMode::EchoToConsole.is_circular());
        assert!(!RecordMode::RecordUntilFull.is_circular());
        assert!(!RecordMode::RecordAsMuchAsPossible.is_circular());
    }

    #[test]
    fn capture_mode_flags() {
        assert_eq!(CaptureMode::Recording.flag(), CategoryFlags::RECORDING);
        assert_eq!(CaptureMode::Monitoring.flag(), CategoryFlags::MONITORING);
    }
}
