#![allow(dead_code)]

use std::collections::BTreeSet;

use annorecon::record::{
    AnnotationRecord, BoxGeometry, DeletionRecord, Instance, RecordHeader, Snapshot, Split,
    UpdatedDate,
};
use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use proptest::strategy::BoxedStrategy;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};

pub fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(64);

    let mut config = ProptestConfig::with_failure_persistence(FileFailurePersistence::WithSource(
        "proptest-regressions",
    ));
    config.cases = cases;
    config.max_shrink_iters = 1024;
    config
}

/// A date `minute` minutes after the start of 2026. Few distinct minutes are
/// generated on purpose so that timestamp ties are common.
pub fn date_at(minute: u32) -> UpdatedDate {
    let base = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    UpdatedDate::from_utc(base + Duration::minutes(i64::from(minute)))
}

pub fn image_name(idx: usize) -> String {
    format!("img{:03}.jpg", idx)
}

/// One task of a generated project.
#[derive(Clone, Debug)]
pub struct GeneratedTask {
    pub id: u64,
    pub completed: bool,
    pub minute: u32,
}

impl GeneratedTask {
    pub fn status(&self) -> &'static str {
        if self.completed {
            "completed"
        } else {
            "annotation"
        }
    }
}

/// A generated project: records and deletions over a small image pool.
#[derive(Clone, Debug)]
pub struct Project {
    pub tasks: Vec<GeneratedTask>,
    pub records: Vec<AnnotationRecord>,
    pub deletions: Vec<DeletionRecord>,
}

impl Project {
    pub fn task(&self, id: u64) -> &GeneratedTask {
        self.tasks
            .iter()
            .find(|t| t.id == id)
            .expect("record references a generated task")
    }
}

/// Identity of a generated record: every record has a unique frame index.
pub fn record_key(record: &AnnotationRecord) -> (String, u64) {
    (record.image_name().to_string(), record.header.frame_index)
}

pub fn sorted_keys<'a>(
    records: impl IntoIterator<Item = &'a AnnotationRecord>,
) -> Vec<(String, u64)> {
    let mut keys: Vec<_> = records.into_iter().map(record_key).collect();
    keys.sort();
    keys
}

fn arb_tasks(max_tasks: usize) -> impl Strategy<Value = Vec<GeneratedTask>> {
    prop::collection::vec((any::<bool>(), 0u32..6), 1..=max_tasks).prop_map(|tasks| {
        tasks
            .into_iter()
            .enumerate()
            .map(|(i, (completed, minute))| GeneratedTask {
                id: i as u64 + 1,
                completed,
                minute,
            })
            .collect()
    })
}

/// Projects with instance records and deletions. The record model allows
/// several instances per image and task, and never mixes them with empty
/// records, so only instances are generated.
pub fn arb_project(
    max_images: usize,
    max_tasks: usize,
    max_events: usize,
) -> BoxedStrategy<Project> {
    arb_tasks(max_tasks)
        .prop_flat_map(move |tasks| {
            let n_tasks = tasks.len();
            let events = prop::collection::vec(
                (0..max_images, 0..n_tasks, prop::bool::weighted(0.2)),
                0..=max_events,
            );
            (Just(tasks), events)
        })
        .prop_map(|(tasks, events)| {
            let mut records = Vec::new();
            let mut deletions = Vec::new();

            for (frame, (image, task_idx, is_deletion)) in events.into_iter().enumerate() {
                let task = &tasks[task_idx];
                let name = image_name(image);
                if is_deletion {
                    deletions.push(
                        DeletionRecord::new(name, task.id, date_at(task.minute))
                            .with_status(task.status())
                            .with_frame_index(frame as u64),
                    );
                } else {
                    let header =
                        RecordHeader::new(name, task.id, task.status(), date_at(task.minute))
                            .with_frame_index(frame as u64);
                    records.push(AnnotationRecord::instance(
                        header,
                        Instance::new("object", BoxGeometry::new(0.0, 0.0, 10.0, 10.0)),
                    ));
                }
            }

            Project {
                tasks,
                records,
                deletions,
            }
        })
        .boxed()
}

fn arb_split() -> impl Strategy<Value = Option<Split>> {
    prop_oneof![
        Just(None),
        Just(Some(Split::Train)),
        Just(Some(Split::Val)),
        Just(Some(Split::Test)),
    ]
}

/// Snapshots over `image_names`. Every row of one image shares its split and
/// its date; the label is `label` so callers can tell sides apart.
pub fn arb_snapshot(
    image_names: Vec<String>,
    label: &'static str,
    max_rows_per_image: usize,
) -> BoxedStrategy<Snapshot> {
    let n = image_names.len();
    prop::collection::vec(
        (any::<bool>(), 1..=max_rows_per_image, arb_split(), 0u32..4),
        n,
    )
    .prop_map(move |per_image| {
        let mut records = Vec::new();
        for (name, (present, rows, split, minute)) in image_names.iter().zip(per_image) {
            if !present {
                continue;
            }
            for frame in 0..rows {
                let mut header =
                    RecordHeader::new(name.clone(), 1u64, "completed", date_at(minute))
                        .with_frame_index(frame as u64);
                header.split = split;
                records.push(AnnotationRecord::instance(
                    header,
                    Instance::new(label, BoxGeometry::new(0.0, 0.0, 5.0, 5.0)),
                ));
            }
        }
        Snapshot::new(records)
    })
    .boxed()
}

pub fn names(prefix: &str, count: usize) -> Vec<String> {
    (0..count).map(|i| format!("{}{:02}.jpg", prefix, i)).collect()
}

pub fn arb_deleted(pool: Vec<String>) -> BoxedStrategy<BTreeSet<String>> {
    prop::sample::subsequence(pool.clone(), 0..=pool.len())
        .prop_map(|names| names.into_iter().collect())
        .boxed()
}
