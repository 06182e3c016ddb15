//! Merge report types and text formatting.

use serde::Serialize;
use std::fmt;

use crate::record::Split;

/// Summary of one merge.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct MergeReport {
    /// Images only in the old snapshot (and not deleted).
    pub only_in_old: usize,
    /// Images only in the new snapshot (and not deleted).
    pub only_in_new: usize,
    /// Images in both snapshots resolved in favor of the new one.
    pub conflicts_to_new: usize,
    /// Images in both snapshots resolved in favor of the old one.
    pub conflicts_to_old: usize,
    /// Images dropped because they are in the deleted list.
    pub deleted: usize,
    /// Rows in the merged snapshot.
    pub rows: usize,
    /// Rows whose split was filled in from the old snapshot.
    pub splits_propagated: usize,
    /// Non-fatal data-quality findings.
    pub diagnostics: Vec<MergeDiagnostic>,
}

impl MergeReport {
    pub fn has_diagnostics(&self) -> bool {
        !self.diagnostics.is_empty()
    }

    /// Number of split conflicts found.
    pub fn split_conflicts(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| matches!(d, MergeDiagnostic::SplitConflict { .. }))
            .count()
    }
}

/// A data-quality condition found while merging. The merge still completes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum MergeDiagnostic {
    /// The old snapshot has no split values at all, so nothing could be
    /// propagated. Usually the wrong file was passed as old.
    SplitHistoryMissing,
    /// Both the old snapshot and the winning new side set a split for the
    /// image, and they differ. The winner's value was kept.
    SplitConflict {
        image_name: String,
        kept: Split,
        discarded: Split,
    },
}

impl fmt::Display for MergeDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeDiagnostic::SplitHistoryMissing => {
                write!(f, "old snapshot has no split values; split propagation skipped")
            }
            MergeDiagnostic::SplitConflict {
                image_name,
                kept,
                discarded,
            } => write!(
                f,
                "split set on both sides for '{}': kept '{}', discarded '{}'",
                image_name, kept, discarded
            ),
        }
    }
}

impl fmt::Display for MergeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Images:    {} only in old, {} only in new, {} deleted",
            self.only_in_old, self.only_in_new, self.deleted
        )?;
        writeln!(
            f,
            "Conflicts: {} resolved to new, {} resolved to old",
            self.conflicts_to_new, self.conflicts_to_old
        )?;
        writeln!(
            f,
            "Rows:      {} ({} split value(s) propagated)",
            self.rows, self.splits_propagated
        )?;

        if !self.diagnostics.is_empty() {
            writeln!(f)?;
            writeln!(f, "Diagnostics:")?;
            for diagnostic in &self.diagnostics {
                writeln!(f, "  [WARN ] {}", diagnostic)?;
            }
        }

        Ok(())
    }
}
