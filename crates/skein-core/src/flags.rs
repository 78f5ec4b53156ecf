//! Small bitsets: per-category enabled state and per-event flags.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Enabled-state bits for one category group.
///
/// Stored in an `AtomicU8` per registry entry and read on every
/// instrumented call, so the representation stays a single byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct CategoryFlags(u8);

impl CategoryFlags {
    /// No consumer is interested in the category.
    pub const NONE: Self = Self(0);
    /// Events are captured into the store during a recording session.
    pub const RECORDING: Self = Self(1 << 0);
    /// Events are captured into the store during a monitoring session.
    pub const MONITORING: Self = Self(1 << 1);
    /// Events are delivered to the registered event callback.
    pub const EVENT_CALLBACK: Self = Self(1 << 2);
    /// Events are delivered to the registered exporter.
    pub const EXPORT: Self = Self(1 << 3);

    /// Mask of the bits that mean "write into the chunk store".
    pub const CAPTURE: Self = Self(Self::RECORDING.0 | Self::MONITORING.0);

    /// Rebuild from the raw byte stored in the registry.
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & 0x0f)
    }

    /// Raw byte for atomic storage.
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Whether any bit is set.
    pub const fn is_any(self) -> bool {
        self.0 != 0
    }

    /// Whether every bit of `other` is set in `self`.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether `self` and `other` share at least one bit.
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }
}

impl BitOr for CategoryFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for CategoryFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for CategoryFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (Self::RECORDING, "recording"),
            (Self::MONITORING, "monitoring"),
            (Self::EVENT_CALLBACK, "event_callback"),
            (Self::EXPORT, "export"),
        ];
        let mut first = true;
        for (flag, name) in names {
            if self.contains(flag) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        if first {
            f.write_str("none")?;
        }
        Ok(())
    }
}

/// Per-event flags carried in the record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct EventFlags(u8);

impl EventFlags {
    /// No flags.
    pub const NONE: Self = Self(0);
    /// The event carries a caller-supplied id.
    pub const HAS_ID: Self = Self(1 << 0);
    /// Instant event scoped to the whole process.
    pub const SCOPE_PROCESS: Self = Self(1 << 1);
    /// Instant event scoped globally.
    pub const SCOPE_GLOBAL: Self = Self(1 << 2);
    /// The event was written through the shared chunk rather than a
    /// thread-local cache.
    pub const SHARED_CHUNK: Self = Self(1 << 3);

    /// Raw bits.
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Whether every bit of `other` is set in `self`.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for EventFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for EventFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}
