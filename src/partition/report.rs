//! Partition summary.

use serde::Serialize;
use std::fmt;

/// Row and image counts of one partition run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PartitionReport {
    /// Distinct images seen in records or deletions.
    pub images: usize,
    pub current: usize,
    pub obsolete: usize,
    pub in_progress: usize,
    /// Images whose most recent event is a deletion.
    pub deleted: usize,
}

impl fmt::Display for PartitionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Images:      {}", self.images)?;
        writeln!(f, "Current:     {} row(s)", self.current)?;
        writeln!(f, "Obsolete:    {} row(s)", self.obsolete)?;
        writeln!(f, "In progress: {} row(s)", self.in_progress)?;
        writeln!(f, "Deleted:     {} image(s)", self.deleted)
    }
}
