//! Diagnostics produced when two filters are merged.

use std::fmt;

use skein_core::RecordMode;

/// A setting that could not be merged because the two filters disagree.
///
/// Conflicts are diagnostics, not errors: the receiving filter keeps its
/// own value and the merge otherwise proceeds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MergeConflict {
    /// The filters request different record modes.
    RecordMode {
        /// Mode retained by the receiver.
        kept: RecordMode,
        /// Mode requested by the incoming filter.
        rejected: RecordMode,
    },
    /// One filter requests sampling and the other does not.
    Sampling {
        /// Setting retained by the receiver.
        kept: bool,
    },
    /// One filter requests argument filtering and the other does not.
    ArgumentFilter {
        /// Setting retained by the receiver.
        kept: bool,
    },
}

impl fmt::Display for MergeConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RecordMode { kept, rejected } => {
                write!(f, "record mode mismatch: keeping {kept}, ignoring {rejected}")
            }
            Self::Sampling { kept } => {
                write!(f, "sampling mismatch: keeping enabled={kept}")
            }
            Self::ArgumentFilter { kept } => {
                write!(f, "argument filter mismatch: keeping enabled={kept}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_both_modes() {
        let c = MergeConflict::RecordMode {
            kept: RecordMode::RecordContinuously,
            rejected: RecordMode::RecordUntilFull,
        };
        assert_eq!(
            c.to_string(),
            "record mode mismatch: keeping record-continuously, ignoring record-until-full"
        );
    }
}
