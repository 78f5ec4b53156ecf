//! Trace log configuration, validation, and error types.

use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use skein_arena::{StoreConfig, StoreError};
use skein_core::{Clock, EventFormatter, MonotonicClock};

use crate::format::JsonFormatter;
use crate::registry::{CategoryRegistry, BUILTIN_CATEGORIES};

// ── ConfigError ────────────────────────────────────────────────────

/// Errors detected during [`TraceLogConfig::validate()`].
#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// The store override is invalid.
    Store(StoreError),
    /// `max_category_groups` leaves no room beyond the built-in entries.
    TooFewCategoryGroups {
        /// The configured value.
        configured: usize,
        /// Smallest accepted value.
        min: usize,
    },
    /// `max_category_groups` does not fit a 16-bit category index.
    TooManyCategoryGroups {
        /// The configured value.
        configured: usize,
        /// Largest accepted value.
        max: usize,
    },
    /// `max_fragment_bytes` is zero.
    ZeroFragmentBytes,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Store(e) => write!(f, "store: {e}"),
            Self::TooFewCategoryGroups { configured, min } => {
                write!(f, "max_category_groups {configured} is below minimum of {min}")
            }
            Self::TooManyCategoryGroups { configured, max } => {
                write!(f, "max_category_groups {configured} exceeds maximum of {max}")
            }
            Self::ZeroFragmentBytes => write!(f, "max_fragment_bytes must be at least 1"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StoreError> for ConfigError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

// ── TraceLogConfig ─────────────────────────────────────────────────

/// Construction parameters for a [`TraceLog`](crate::TraceLog).
#[derive(Clone)]
pub struct TraceLogConfig {
    /// Capacity of the category registry, built-in entries included.
    /// Default: 200.
    pub max_category_groups: usize,
    /// How long a flush waits for registered threads to surrender their
    /// chunks. Default: 3 s.
    pub flush_timeout: Duration,
    /// Upper bound on a drained fragment, in bytes. A single event larger
    /// than this is still delivered whole. Default: 100 KiB.
    pub max_fragment_bytes: usize,
    /// Store used for every session instead of the per-record-mode
    /// default. Default: `None`.
    pub store_overrides: Option<StoreConfig>,
    /// Timestamp source. Default: [`MonotonicClock`].
    pub clock: Arc<dyn Clock>,
    /// Serializer used when draining. Default: [`JsonFormatter`].
    pub formatter: Arc<dyn EventFormatter>,
}

impl TraceLogConfig {
    /// Default registry capacity.
    pub const DEFAULT_MAX_CATEGORY_GROUPS: usize = 200;

    /// Default flush timeout.
    pub const DEFAULT_FLUSH_TIMEOUT: Duration = Duration::from_millis(3000);

    /// Default fragment bound.
    pub const DEFAULT_MAX_FRAGMENT_BYTES: usize = 100 * 1024;

    /// Largest accepted registry capacity.
    pub const MAX_CATEGORY_GROUPS: usize = CategoryRegistry::MAX_CAPACITY;

    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let min = BUILTIN_CATEGORIES.len() + 1;
        if self.max_category_groups < min {
            return Err(ConfigError::TooFewCategoryGroups {
                configured: self.max_category_groups,
                min,
            });
        }
        if self.max_category_groups > Self::MAX_CATEGORY_GROUPS {
            return Err(ConfigError::TooManyCategoryGroups {
                configured: self.max_category_groups,
                max: Self::MAX_CATEGORY_GROUPS,
            });
        }
        if self.max_fragment_bytes == 0 {
            return Err(ConfigError::ZeroFragmentBytes);
        }
        if let Some(store) = &self.store_overrides {
            store.validate()?;
        }
        Ok(())
    }
}

impl Default for TraceLogConfig {
    fn default() -> Self {
        Self {
            max_category_groups: Self::DEFAULT_MAX_CATEGORY_GROUPS,
            flush_timeout: Self::DEFAULT_FLUSH_TIMEOUT,
            max_fragment_bytes: Self::DEFAULT_MAX_FRAGMENT_BYTES,
            store_overrides: None,
            clock: Arc::new(MonotonicClock::new()),
            formatter: Arc::new(JsonFormatter::new()),
        }
    }
}

impl fmt::Debug for TraceLogConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraceLogConfig")
            .field("max_category_groups", &self.max_category_groups)
            .field("flush_timeout", &self.flush_timeout)
            .field("max_fragment_bytes", &self.max_fragment_bytes)
            .field("store_overrides", &self.store_overrides)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let cfg = TraceLogConfig::default();
        assert_eq!(cfg.max_category_groups, 200);
        assert_eq!(cfg.flush_timeout, Duration::from_secs(3));
        assert_eq!(cfg.max_fragment_bytes, 102_400);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn zero_category_groups_rejected() {
        let cfg = TraceLogConfig {
            max_category_groups: 0,
            ..Default::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::TooFewCategoryGroups { configured: 0, .. })
        ));
    }

    #[test]
    fn oversized_registry_rejected() {
        let cfg = TraceLogConfig {
            max_category_groups: 1 << 20,
            ..Default::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::TooManyCategoryGroups { .. })
        ));
    }

    #[test]
    fn zero_fragment_bytes_rejected() {
        let cfg = TraceLogConfig {
            max_fragment_bytes: 0,
            ..Default::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroFragmentBytes));
    }

    #[test]
    fn store_override_errors_wrap() {
        let cfg = TraceLogConfig {
            store_overrides: Some(StoreConfig::ring(0)),
            ..Default::default()
        };
        let err = cfg.validate().unwrap_err();
        assert_eq!(err, ConfigError::Store(StoreError::ZeroChunks));
        assert!(err.source().is_some());
        assert_eq!(err.to_string(), "store: store must hold at least one chunk");
    }
}
