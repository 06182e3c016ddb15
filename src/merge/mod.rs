//! Merging of two snapshots taken at different points in time.
//!
//! Images found in only one snapshot pass through. For images found in both,
//! one side wins and its records replace the other side's: by default the new
//! snapshot always wins; in by-time mode the side with the strictly later
//! `task_updated_date` wins and the new side takes ties. Deleted images are
//! dropped afterwards, and `split` values are carried over from the old
//! snapshot wherever the merged rows leave them unset.

mod report;

pub use report::{MergeDiagnostic, MergeReport};

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};

use crate::error::AnnoreconError;
use crate::record::{AnnotationRecord, Snapshot, Split};

/// Merge options.
#[derive(Clone, Copy, Debug, Default)]
pub struct MergeOptions {
    /// Resolve images present in both snapshots by their update time instead
    /// of always preferring the new snapshot.
    pub by_time: bool,
}

/// Merged snapshot plus what happened while producing it.
#[derive(Clone, Debug)]
pub struct MergeOutcome {
    pub snapshot: Snapshot,
    pub report: MergeReport,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Side {
    Old,
    New,
}

/// Merges `old` and `new`, dropping every image named in `deleted`.
///
/// Surviving old rows come first, then surviving new rows, each in their
/// snapshot order.
///
/// # Errors
/// Returns [`AnnoreconError::MissingTimeColumn`] when `by_time` is set and a
/// non-empty snapshot carries no `task_updated_date` on any record. Per-image
/// dates that fail to parse are not an error; the new side wins those.
pub fn merge(
    old: &Snapshot,
    new: &Snapshot,
    deleted: &BTreeSet<String>,
    opts: &MergeOptions,
) -> Result<MergeOutcome, AnnoreconError> {
    if opts.by_time {
        require_dates(old, "old")?;
        require_dates(new, "new")?;
    }

    let old_images = old.image_names();
    let new_images = new.image_names();

    let winners: BTreeMap<&str, Side> = if opts.by_time {
        resolve_by_time(old, new, &old_images, &new_images)
    } else {
        old_images
            .intersection(&new_images)
            .map(|name| (*name, Side::New))
            .collect()
    };

    let is_deleted = |name: &str| deleted.contains(name);
    let keep_old = |name: &str| {
        !is_deleted(name) && winners.get(name).map_or(true, |side| *side == Side::Old)
    };
    let keep_new = |name: &str| {
        !is_deleted(name) && winners.get(name).map_or(true, |side| *side == Side::New)
    };

    let mut records: Vec<AnnotationRecord> = old
        .records()
        .iter()
        .filter(|r| keep_old(r.image_name()))
        .chain(new.records().iter().filter(|r| keep_new(r.image_name())))
        .cloned()
        .collect();

    let mut report = MergeReport {
        only_in_old: old_images
            .difference(&new_images)
            .filter(|name| !is_deleted(name))
            .count(),
        only_in_new: new_images
            .difference(&old_images)
            .filter(|name| !is_deleted(name))
            .count(),
        conflicts_to_new: winners
            .iter()
            .filter(|(name, side)| **side == Side::New && !is_deleted(name))
            .count(),
        conflicts_to_old: winners
            .iter()
            .filter(|(name, side)| **side == Side::Old && !is_deleted(name))
            .count(),
        deleted: old_images
            .union(&new_images)
            .filter(|name| is_deleted(name))
            .count(),
        ..Default::default()
    };

    propagate_splits(&mut records, old, new, &winners, deleted, &mut report);
    report.rows = records.len();

    tracing::info!(
        "Merge result: old-only={}, new-only={}, to-new={}, to-old={}, deleted={}, rows={}",
        report.only_in_old,
        report.only_in_new,
        report.conflicts_to_new,
        report.conflicts_to_old,
        report.deleted,
        report.rows
    );

    Ok(MergeOutcome {
        snapshot: Snapshot::new(records),
        report,
    })
}

fn require_dates(snapshot: &Snapshot, side: &'static str) -> Result<(), AnnoreconError> {
    let has_dates = snapshot
        .records()
        .iter()
        .any(|r| !r.header.task_updated_date.is_blank());
    if snapshot.is_empty() || has_dates {
        Ok(())
    } else {
        Err(AnnoreconError::MissingTimeColumn { side })
    }
}

/// Latest parseable update time per image; unparsable dates are skipped.
fn latest_dates(snapshot: &Snapshot) -> BTreeMap<&str, DateTime<Utc>> {
    let mut latest: BTreeMap<&str, DateTime<Utc>> = BTreeMap::new();
    for record in snapshot.records() {
        let Some(at) = record.header.task_updated_date.parse() else {
            continue;
        };
        latest
            .entry(record.image_name())
            .and_modify(|current| *current = (*current).max(at))
            .or_insert(at);
    }
    latest
}

fn resolve_by_time<'a>(
    old: &'a Snapshot,
    new: &'a Snapshot,
    old_images: &BTreeSet<&'a str>,
    new_images: &BTreeSet<&'a str>,
) -> BTreeMap<&'a str, Side> {
    let old_dates = latest_dates(old);
    let new_dates = latest_dates(new);

    old_images
        .intersection(new_images)
        .map(|name| {
            let side = match (old_dates.get(name), new_dates.get(name)) {
                (Some(old_at), Some(new_at)) if old_at > new_at => Side::Old,
                _ => Side::New,
            };
            (*name, side)
        })
        .collect()
}

/// First split set for each image in `snapshot`, in row order.
fn first_splits(snapshot: &Snapshot) -> BTreeMap<&str, Split> {
    let mut splits = BTreeMap::new();
    for record in snapshot.records() {
        if let Some(split) = record.split() {
            splits.entry(record.image_name()).or_insert(split);
        }
    }
    splits
}

fn propagate_splits(
    records: &mut [AnnotationRecord],
    old: &Snapshot,
    new: &Snapshot,
    winners: &BTreeMap<&str, Side>,
    deleted: &BTreeSet<String>,
    report: &mut MergeReport,
) {
    let old_splits = first_splits(old);
    if old_splits.is_empty() {
        tracing::warn!("Old snapshot has no split values; split propagation skipped");
        report.diagnostics.push(MergeDiagnostic::SplitHistoryMissing);
        return;
    }

    let new_splits = first_splits(new);
    for (name, side) in winners {
        if *side != Side::New || deleted.contains(*name) {
            continue;
        }
        if let (Some(&kept), Some(&discarded)) = (new_splits.get(name), old_splits.get(name)) {
            if kept != discarded {
                report.diagnostics.push(MergeDiagnostic::SplitConflict {
                    image_name: name.to_string(),
                    kept,
                    discarded,
                });
            }
        }
    }
    let conflicts = report.split_conflicts();
    if conflicts > 0 {
        tracing::warn!(
            "Split differs between sides for {} image(s); keeping the winning side's value",
            conflicts
        );
    }

    for record in records.iter_mut() {
        if record.header.split.is_some() {
            continue;
        }
        if let Some(split) = old_splits.get(record.header.image_name.as_str()) {
            record.header.split = Some(*split);
            report.splits_propagated += 1;
        }
    }

    if report.splits_propagated > 0 {
        tracing::info!(
            "Split propagation: filled {} row(s) from the old snapshot",
            report.splits_propagated
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{BoxGeometry, Instance, RecordHeader};

    fn row(image: &str, label: &str, split: Option<Split>) -> AnnotationRecord {
        let mut header = RecordHeader::new(image, 1u64, "completed", "2026-01-01T00:00:00");
        header.split = split;
        AnnotationRecord::instance(
            header,
            Instance::new(label, BoxGeometry::new(0.0, 0.0, 1.0, 1.0)),
        )
    }

    fn dated(image: &str, task_id: u64, updated: &str) -> AnnotationRecord {
        AnnotationRecord::empty(RecordHeader::new(image, task_id, "completed", updated))
    }

    fn no_deleted() -> BTreeSet<String> {
        BTreeSet::new()
    }

    fn splits_by_image(snapshot: &Snapshot) -> BTreeMap<String, Option<Split>> {
        snapshot
            .records()
            .iter()
            .map(|r| (r.image_name().to_string(), r.split()))
            .collect()
    }

    fn run(old: Vec<AnnotationRecord>, new: Vec<AnnotationRecord>) -> MergeOutcome {
        merge(&old.into(), &new.into(), &no_deleted(), &MergeOptions::default()).unwrap()
    }

    #[test]
    fn new_wins_and_inherits_old_split() {
        let outcome = run(
            vec![
                row("a.jpg", "cat", Some(Split::Train)),
                row("b.jpg", "cat", Some(Split::Val)),
            ],
            vec![
                row("a.jpg", "dog", None),
                row("b.jpg", "dog", None),
                row("c.jpg", "dog", None),
            ],
        );

        let splits = splits_by_image(&outcome.snapshot);
        assert_eq!(splits["a.jpg"], Some(Split::Train));
        assert_eq!(splits["b.jpg"], Some(Split::Val));
        assert_eq!(splits["c.jpg"], None);
        assert!(outcome.snapshot.records().iter().all(|r| matches!(
            &r.body,
            crate::record::RecordBody::Instance(i) if i.label == "dog"
        )));
        assert_eq!(outcome.report.conflicts_to_new, 2);
        assert_eq!(outcome.report.only_in_new, 1);
        assert_eq!(outcome.report.splits_propagated, 2);
    }

    #[test]
    fn old_only_images_keep_their_split() {
        let outcome = run(
            vec![row("a.jpg", "cat", Some(Split::Train))],
            vec![row("b.jpg", "cat", None)],
        );

        let splits = splits_by_image(&outcome.snapshot);
        assert_eq!(splits["a.jpg"], Some(Split::Train));
        assert_eq!(splits["b.jpg"], None);
    }

    #[test]
    fn deleted_images_are_removed() {
        let old: Snapshot = vec![
            row("a.jpg", "cat", Some(Split::Train)),
            row("b.jpg", "cat", Some(Split::Val)),
        ]
        .into();
        let new: Snapshot = vec![row("a.jpg", "cat", None), row("b.jpg", "cat", None)].into();
        let deleted: BTreeSet<String> = ["a.jpg".to_string()].into();

        let outcome = merge(&old, &new, &deleted, &MergeOptions::default()).unwrap();

        let splits = splits_by_image(&outcome.snapshot);
        assert!(!splits.contains_key("a.jpg"));
        assert_eq!(splits["b.jpg"], Some(Split::Val));
        assert_eq!(outcome.report.deleted, 1);
        assert_eq!(outcome.report.conflicts_to_new, 1);
    }

    #[test]
    fn missing_split_history_is_diagnosed() {
        let outcome = run(vec![row("a.jpg", "cat", None)], vec![row("a.jpg", "cat", None)]);

        assert_eq!(outcome.report.diagnostics, vec![MergeDiagnostic::SplitHistoryMissing]);
        assert_eq!(outcome.snapshot.records()[0].split(), None);
    }

    #[test]
    fn conflicting_split_keeps_winner_and_is_diagnosed() {
        let outcome = run(
            vec![row("a.jpg", "cat", Some(Split::Train))],
            vec![row("a.jpg", "cat", Some(Split::Val))],
        );

        assert_eq!(outcome.snapshot.records()[0].split(), Some(Split::Val));
        assert_eq!(
            outcome.report.diagnostics,
            vec![MergeDiagnostic::SplitConflict {
                image_name: "a.jpg".to_string(),
                kept: Split::Val,
                discarded: Split::Train,
            }]
        );
    }

    #[test]
    fn partial_propagation_leaves_set_values_alone() {
        let outcome = run(
            vec![
                row("a.jpg", "cat", Some(Split::Train)),
                row("b.jpg", "cat", Some(Split::Val)),
            ],
            vec![
                row("a.jpg", "cat", Some(Split::Test)),
                row("b.jpg", "cat", None),
            ],
        );

        let splits = splits_by_image(&outcome.snapshot);
        assert_eq!(splits["a.jpg"], Some(Split::Test));
        assert_eq!(splits["b.jpg"], Some(Split::Val));
        assert_eq!(outcome.report.splits_propagated, 1);
        assert_eq!(outcome.report.split_conflicts(), 1);
    }

    #[test]
    fn every_row_of_a_multi_instance_image_gets_the_split() {
        let outcome = run(
            vec![row("a.jpg", "cat", Some(Split::Train))],
            vec![row("a.jpg", "cat", None), row("a.jpg", "dog", None)],
        );

        assert_eq!(outcome.snapshot.len(), 2);
        assert!(outcome.snapshot.records().iter().all(|r| r.split() == Some(Split::Train)));
    }

    #[test]
    fn by_time_prefers_strictly_newer_old_side() {
        let old: Snapshot = vec![
            dated("a.jpg", 2, "2026-01-05T00:00:00"),
            dated("b.jpg", 2, "2026-01-01T00:00:00"),
        ]
        .into();
        let new: Snapshot = vec![
            dated("a.jpg", 3, "2026-01-02T00:00:00"),
            dated("b.jpg", 3, "2026-01-02T00:00:00"),
        ]
        .into();
        let opts = MergeOptions { by_time: true };

        let outcome = merge(&old, &new, &no_deleted(), &opts).unwrap();

        let tasks: BTreeMap<&str, u64> = outcome
            .snapshot
            .records()
            .iter()
            .map(|r| (r.image_name(), r.task_id().as_u64()))
            .collect();
        assert_eq!(tasks["a.jpg"], 2);
        assert_eq!(tasks["b.jpg"], 3);
        assert_eq!(outcome.report.conflicts_to_old, 1);
        assert_eq!(outcome.report.conflicts_to_new, 1);
    }

    #[test]
    fn by_time_ties_and_bad_dates_go_to_new() {
        let old: Snapshot = vec![
            dated("tie.jpg", 1, "2026-01-02T00:00:00Z"),
            dated("bad.jpg", 1, "2026-03-01T00:00:00"),
        ]
        .into();
        let new: Snapshot = vec![
            dated("tie.jpg", 2, "2026-01-02T03:00:00+03:00"),
            dated("bad.jpg", 2, "garbage"),
        ]
        .into();
        let opts = MergeOptions { by_time: true };

        let outcome = merge(&old, &new, &no_deleted(), &opts).unwrap();

        assert!(outcome.snapshot.records().iter().all(|r| r.task_id().as_u64() == 2));
        assert_eq!(outcome.report.conflicts_to_new, 2);
    }

    #[test]
    fn by_time_without_any_dates_is_an_error() {
        let old: Snapshot = vec![dated("a.jpg", 1, "")].into();
        let new: Snapshot = vec![dated("a.jpg", 2, "2026-01-02T00:00:00")].into();
        let opts = MergeOptions { by_time: true };

        let err = merge(&old, &new, &no_deleted(), &opts).unwrap_err();
        assert!(matches!(err, AnnoreconError::MissingTimeColumn { side: "old" }));

        // Default mode never looks at dates.
        assert!(merge(&old, &new, &no_deleted(), &MergeOptions::default()).is_ok());
    }

    #[test]
    fn disjoint_snapshots_concatenate() {
        let old = vec![row("a.jpg", "cat", Some(Split::Train))];
        let new = vec![row("b.jpg", "dog", Some(Split::Test))];
        let expected: Vec<AnnotationRecord> = old.iter().chain(&new).cloned().collect();

        for by_time in [false, true] {
            let outcome = merge(
                &old.clone().into(),
                &new.clone().into(),
                &no_deleted(),
                &MergeOptions { by_time },
            )
            .unwrap();
            assert_eq!(outcome.snapshot.records(), expected.as_slice());
            assert!(!outcome.report.has_diagnostics());
        }
    }
}
