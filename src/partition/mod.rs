//! Temporal partitioning of a project's records.
//!
//! Every image is judged on its own. Its *latest event* is the record or
//! deletion with the greatest `task_updated_date`; a deletion beats an
//! annotation record with the same timestamp. If that event is a deletion the
//! image is deleted and all of its records are obsolete. Otherwise records of
//! non-completed tasks are in progress, records of the most recently updated
//! completed task are current, and records of older completed tasks are
//! obsolete.

mod report;

pub use report::PartitionReport;

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};

use crate::error::AnnoreconError;
use crate::record::{
    AnnotationRecord, DeletionRecord, ProjectRecords, RecordBody, Snapshot, TaskId, UpdatedDate,
};

/// The four-way classification of a project's records.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PartitionResult {
    /// Records of each image's most recent completed task.
    pub current: Vec<AnnotationRecord>,
    /// Records superseded by a newer completed task or by a deletion.
    pub obsolete: Vec<AnnotationRecord>,
    /// Records of tasks that are not completed yet.
    pub in_progress: Vec<AnnotationRecord>,
    /// The winning deletion of every deleted image, sorted by image name.
    pub deleted: Vec<DeletionRecord>,
}

impl PartitionResult {
    /// Names of the deleted images, sorted.
    pub fn deleted_names(&self) -> impl Iterator<Item = &str> {
        self.deleted.iter().map(|d| d.image_name.as_str())
    }

    /// The current bucket as a snapshot, ready to be merged later.
    pub fn current_snapshot(&self) -> Snapshot {
        Snapshot::new(self.current.clone())
    }

    pub fn report(&self) -> PartitionReport {
        let mut images: Vec<&str> = self
            .current
            .iter()
            .chain(&self.obsolete)
            .chain(&self.in_progress)
            .map(|r| r.image_name())
            .chain(self.deleted_names())
            .collect();
        images.sort_unstable();
        images.dedup();

        PartitionReport {
            images: images.len(),
            current: self.current.len(),
            obsolete: self.obsolete.len(),
            in_progress: self.in_progress.len(),
            deleted: self.deleted.len(),
        }
    }
}

/// What the latest event of an image was. `Annotation < Deletion`, so a
/// deletion wins a timestamp tie.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum EventKind {
    Annotation,
    Deletion,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct EventKey {
    at: DateTime<Utc>,
    kind: EventKind,
    task_id: TaskId,
}

#[derive(Debug, Default)]
struct ImageState {
    latest: Option<EventKey>,
    /// Index into the deletions when `latest` is a deletion.
    latest_deletion: Option<usize>,
    /// Most recent completed task (ties go to the larger task id).
    reference: Option<(DateTime<Utc>, TaskId)>,
}

impl ImageState {
    fn observe(&mut self, key: EventKey, deletion: Option<usize>) {
        if self.latest.map_or(true, |latest| key > latest) {
            self.latest = Some(key);
            self.latest_deletion = deletion;
        }
    }

    fn observe_completed(&mut self, at: DateTime<Utc>, task_id: TaskId) {
        let candidate = (at, task_id);
        if self.reference.map_or(true, |current| candidate > current) {
            self.reference = Some(candidate);
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Bucket {
    Current,
    Obsolete,
    InProgress,
}

/// Partitions a project's records.
///
/// See the module documentation for the rules. Bucket contents keep input
/// order.
///
/// # Errors
/// - [`AnnoreconError::InvalidTimestamp`] if any record or deletion has a
///   blank or unparsable `task_updated_date`.
/// - [`AnnoreconError::ConflictingRecords`] if one task holds both an
///   instance and an empty-image record for the same image, or two
///   empty-image records.
pub fn partition(
    records: Vec<AnnotationRecord>,
    deletions: Vec<DeletionRecord>,
) -> Result<PartitionResult, AnnoreconError> {
    check_task_consistency(&records)?;

    let mut states: BTreeMap<&str, ImageState> = BTreeMap::new();

    for record in &records {
        let header = &record.header;
        let at = parse_date(&header.task_updated_date, &header.image_name, header.task_id)?;
        let state = states.entry(header.image_name.as_str()).or_default();
        state.observe(
            EventKey {
                at,
                kind: EventKind::Annotation,
                task_id: header.task_id,
            },
            None,
        );
        if header.task_status.is_completed() {
            state.observe_completed(at, header.task_id);
        }
    }

    for (idx, deletion) in deletions.iter().enumerate() {
        let at = parse_date(
            &deletion.task_updated_date,
            &deletion.image_name,
            deletion.task_id,
        )?;
        states.entry(deletion.image_name.as_str()).or_default().observe(
            EventKey {
                at,
                kind: EventKind::Deletion,
                task_id: deletion.task_id,
            },
            Some(idx),
        );
    }

    let routes: Vec<Bucket> = records
        .iter()
        .map(|record| {
            let state = &states[record.image_name()];
            if state.latest_deletion.is_some() {
                Bucket::Obsolete
            } else if !record.header.task_status.is_completed() {
                Bucket::InProgress
            } else if state.reference.map(|(_, task_id)| task_id) == Some(record.task_id()) {
                Bucket::Current
            } else {
                Bucket::Obsolete
            }
        })
        .collect();

    // BTreeMap iteration keeps this sorted by image name.
    let deleted: Vec<DeletionRecord> = states
        .values()
        .filter_map(|state| state.latest_deletion)
        .map(|idx| deletions[idx].clone())
        .collect();

    if !deleted.is_empty() {
        tracing::debug!("Images deleted in their latest task: {}", deleted.len());
    }

    let mut result = PartitionResult {
        deleted,
        ..Default::default()
    };
    for (record, bucket) in records.into_iter().zip(routes) {
        match bucket {
            Bucket::Current => result.current.push(record),
            Bucket::Obsolete => result.obsolete.push(record),
            Bucket::InProgress => result.in_progress.push(record),
        }
    }

    tracing::debug!(
        "Partition result: current={}, obsolete={}, in_progress={}, deleted={}",
        result.current.len(),
        result.obsolete.len(),
        result.in_progress.len(),
        result.deleted.len()
    );

    Ok(result)
}

/// Partitions the flat output of the annotation-source adapter.
pub fn partition_project(project: ProjectRecords) -> Result<PartitionResult, AnnoreconError> {
    partition(project.records, project.deletions)
}

fn parse_date(
    date: &UpdatedDate,
    image_name: &str,
    task_id: TaskId,
) -> Result<DateTime<Utc>, AnnoreconError> {
    date.parse().ok_or_else(|| AnnoreconError::InvalidTimestamp {
        image_name: image_name.to_string(),
        task_id,
        value: date.as_str().to_string(),
    })
}

/// Within one task an image is either a set of instances or a single
/// empty-image record.
fn check_task_consistency(records: &[AnnotationRecord]) -> Result<(), AnnoreconError> {
    #[derive(Default)]
    struct Seen {
        instance: bool,
        empty: bool,
    }

    let mut seen: HashMap<(&str, TaskId), Seen> = HashMap::new();
    for record in records {
        let entry = seen
            .entry((record.image_name(), record.task_id()))
            .or_default();
        let conflict = match record.body {
            RecordBody::Instance(_) => {
                entry.instance = true;
                entry.empty.then_some("instance and empty-image records")
            }
            RecordBody::Empty => {
                let reason = if entry.empty {
                    Some("duplicate empty-image records")
                } else if entry.instance {
                    Some("instance and empty-image records")
                } else {
                    None
                };
                entry.empty = true;
                reason
            }
        };
        if let Some(reason) = conflict {
            return Err(AnnoreconError::ConflictingRecords {
                image_name: record.image_name().to_string(),
                task_id: record.task_id(),
                reason,
            });
        }
    }
    Ok(())
}
