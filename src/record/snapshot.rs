//! Immutable collections of current annotation state.

use std::collections::BTreeSet;

use super::model::AnnotationRecord;

/// An ordered collection of annotation records describing "current" state for
/// a set of images at one point in time.
///
/// Snapshots are produced once (by a partition run, a merge, or by reading a
/// file) and handed to the next stage by value or by reference; they expose no
/// mutation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Snapshot {
    records: Vec<AnnotationRecord>,
}

impl Snapshot {
    pub fn new(records: Vec<AnnotationRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[AnnotationRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Distinct image names, sorted.
    pub fn image_names(&self) -> BTreeSet<&str> {
        self.records.iter().map(|r| r.image_name()).collect()
    }

    /// All records for one image, in snapshot order.
    pub fn records_for<'a>(
        &'a self,
        image_name: &'a str,
    ) -> impl Iterator<Item = &'a AnnotationRecord> + 'a {
        self.records
            .iter()
            .filter(move |r| r.image_name() == image_name)
    }
}

impl From<Vec<AnnotationRecord>> for Snapshot {
    fn from(records: Vec<AnnotationRecord>) -> Self {
        Self::new(records)
    }
}
