//! The category filter and its builder.

use std::fmt;

use indexmap::IndexSet;
use skein_core::RecordMode;

use crate::merge::MergeConflict;
use crate::pattern::{glob_match, is_disabled_by_default, is_valid_component};

/// Decides which category groups are of interest to a session.
///
/// A group is a comma-joined list of category names. It is enabled when
/// one of its components is explicitly included, or when the include
/// list is empty, no component is excluded, and at least one component
/// is not disabled-by-default.
///
/// An empty filter ([`CategoryFilter::record_all`]) enables everything
/// that is neither excluded nor disabled-by-default.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CategoryFilter {
    included: IndexSet<String>,
    excluded: IndexSet<String>,
    disabled_by_default: IndexSet<String>,
    synthetic_delays: Vec<String>,
    record_mode: RecordMode,
    sampling_enabled: bool,
    argument_filter_enabled: bool,
}

impl CategoryFilter {
    /// Start building a filter.
    pub fn builder() -> CategoryFilterBuilder {
        CategoryFilterBuilder::default()
    }

    /// A filter with no include list: every ordinary category is enabled.
    pub fn record_all() -> Self {
        Self::default()
    }

    /// Explicitly included patterns.
    pub fn included(&self) -> impl Iterator<Item = &str> {
        self.included.iter().map(String::as_str)
    }

    /// Excluded patterns.
    pub fn excluded(&self) -> impl Iterator<Item = &str> {
        self.excluded.iter().map(String::as_str)
    }

    /// Explicitly included `disabled-by-default-*` patterns.
    pub fn disabled_by_default(&self) -> impl Iterator<Item = &str> {
        self.disabled_by_default.iter().map(String::as_str)
    }

    /// Synthetic delay specifications, in insertion order.
    pub fn synthetic_delays(&self) -> &[String] {
        &self.synthetic_delays
    }

    /// Record mode requested by this filter.
    pub fn record_mode(&self) -> RecordMode {
        self.record_mode
    }

    /// Whether the periodic sampler was requested.
    pub fn sampling_enabled(&self) -> bool {
        self.sampling_enabled
    }

    /// Whether argument filtering was requested.
    pub fn argument_filter_enabled(&self) -> bool {
        self.argument_filter_enabled
    }

    /// Whether the category group `group` is enabled by this filter.
    ///
    /// Any malformed component makes the whole group disabled.
    pub fn is_enabled(&self, group: &str) -> bool {
        if !group.split(',').all(is_valid_component) {
            return false;
        }

        let mut had_ordinary = false;
        for component in group.split(',') {
            if matches_any(&self.disabled_by_default, component) {
                return true;
            }
            if !is_disabled_by_default(component) {
                if matches_any(&self.included, component) {
                    return true;
                }
                had_ordinary = true;
            }
        }

        let excluded = group
            .split(',')
            .any(|component| matches_any(&self.excluded, component));

        !excluded && self.included.is_empty() && had_ordinary
    }

    /// Merge `other` into `self`, broadening the filter.
    ///
    /// Exclusions, disabled-by-default includes and synthetic delays are
    /// appended. The include lists are unioned only when both are
    /// non-empty; otherwise the result includes everything. Record mode,
    /// sampling and argument filtering are not merged: mismatches are
    /// returned as conflicts and `self` keeps its own values.
    pub fn merge(&mut self, other: &CategoryFilter) -> Vec<MergeConflict> {
        if !self.included.is_empty() && !other.included.is_empty() {
            self.included.extend(other.included.iter().cloned());
        } else {
            self.included.clear();
        }
        self.excluded.extend(other.excluded.iter().cloned());
        self.disabled_by_default
            .extend(other.disabled_by_default.iter().cloned());
        self.synthetic_delays
            .extend(other.synthetic_delays.iter().cloned());

        let mut conflicts = Vec::new();
        if self.record_mode != other.record_mode {
            conflicts.push(MergeConflict::RecordMode {
                kept: self.record_mode,
                rejected: other.record_mode,
            });
        }
        if self.sampling_enabled != other.sampling_enabled {
            conflicts.push(MergeConflict::Sampling {
                kept: self.sampling_enabled,
            });
        }
        if self.argument_filter_enabled != other.argument_filter_enabled {
            conflicts.push(MergeConflict::ArgumentFilter {
                kept: self.argument_filter_enabled,
            });
        }
        conflicts
    }
}

fn matches_any(patterns: &IndexSet<String>, component: &str) -> bool {
    patterns.iter().any(|p| glob_match(p, component))
}

impl fmt::Display for CategoryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = Vec::new();
        parts.extend(self.included.iter().cloned());
        parts.extend(self.excluded.iter().map(|e| format!("-{e}")));
        parts.extend(self.disabled_by_default.iter().cloned());
        parts.extend(self.synthetic_delays.iter().map(|d| format!("DELAY({d})")));
        f.write_str(&parts.join(","))
    }
}

// ── Builder ────────────────────────────────────────────────────

/// Programmatic construction of a [`CategoryFilter`].
#[derive(Clone, Debug, Default)]
pub struct CategoryFilterBuilder {
    filter: CategoryFilter,
}

impl CategoryFilterBuilder {
    /// Include a pattern. `disabled-by-default-*` names land in the
    /// disabled-by-default list instead of the include list.
    pub fn include(mut self, pattern: impl Into<String>) -> Self {
        let pattern = pattern.into();
        if is_disabled_by_default(&pattern) {
            self.filter.disabled_by_default.insert(pattern);
        } else {
            self.filter.included.insert(pattern);
        }
        self
    }

    /// Exclude a pattern.
    pub fn exclude(mut self, pattern: impl Into<String>) -> Self {
        self.filter.excluded.insert(pattern.into());
        self
    }

    /// Add a synthetic delay specification.
    pub fn synthetic_delay(mut self, delay: impl Into<String>) -> Self {
        self.filter.synthetic_delays.push(delay.into());
        self
    }

    /// Set the record mode.
    pub fn record_mode(mut self, mode: RecordMode) -> Self {
        self.filter.record_mode = mode;
        self
    }

    /// Request the periodic sampler.
    pub fn sampling(mut self, enabled: bool) -> Self {
        self.filter.sampling_enabled = enabled;
        self
    }

    /// Request argument filtering.
    pub fn argument_filter(mut self, enabled: bool) -> Self {
        self.filter.argument_filter_enabled = enabled;
        self
    }

    /// Finish.
    pub fn build(self) -> CategoryFilter {
        self.filter
    }
}
