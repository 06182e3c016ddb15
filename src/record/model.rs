//! Per-image annotation records.
//!
//! Every record carries a [`RecordHeader`] with the image key and the metadata
//! of the task that produced it. The payload is a tagged variant: an annotated
//! instance, or an image that exists in the task with nothing annotated on it.
//! Deletions are a separate type because they never carry a payload.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::ids::TaskId;
use super::time::UpdatedDate;

/// Completion state of a task.
///
/// Only `completed` has meaning to the engines; every other status the
/// annotation service reports (`annotation`, `validation`, `acceptance`, ...)
/// is kept verbatim and treated as "still in progress".
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskStatus {
    Completed,
    Other(String),
    #[default]
    Unknown,
}

impl TaskStatus {
    /// Returns true for finished tasks.
    pub fn is_completed(&self) -> bool {
        matches!(self, TaskStatus::Completed)
    }

    pub fn as_str(&self) -> &str {
        match self {
            TaskStatus::Completed => "completed",
            TaskStatus::Other(status) => status,
            TaskStatus::Unknown => "",
        }
    }
}

impl From<String> for TaskStatus {
    fn from(raw: String) -> Self {
        match raw.trim() {
            "completed" => TaskStatus::Completed,
            "" => TaskStatus::Unknown,
            _ => TaskStatus::Other(raw),
        }
    }
}

impl From<&str> for TaskStatus {
    fn from(raw: &str) -> Self {
        TaskStatus::from(raw.to_string())
    }
}

impl From<TaskStatus> for String {
    fn from(status: TaskStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User-assigned dataset split of an image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    Train,
    Val,
    Test,
}

impl Split {
    pub fn as_str(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Val => "val",
            Split::Test => "test",
        }
    }
}

impl FromStr for Split {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "train" => Ok(Split::Train),
            "val" => Ok(Split::Val),
            "test" => Ok(Split::Test),
            other => Err(format!(
                "unknown split '{}' (expected train, val or test)",
                other
            )),
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields shared by every annotation record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordHeader {
    /// Image file name; the key used to correlate records across tasks.
    pub image_name: String,

    pub image_width: u32,
    pub image_height: u32,

    pub task_id: TaskId,

    /// Display name of the task.
    pub task_name: String,

    pub task_status: TaskStatus,

    /// Last update time of the task; the ordering key between tasks.
    pub task_updated_date: UpdatedDate,

    /// Position of the image within its task.
    pub frame_index: u64,

    /// Task subset as configured in the annotation service.
    #[serde(default)]
    pub subset: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub split: Option<Split>,
}

impl RecordHeader {
    /// Creates a header with the task metadata the engines need.
    pub fn new(
        image_name: impl Into<String>,
        task_id: impl Into<TaskId>,
        task_status: impl Into<TaskStatus>,
        task_updated_date: impl Into<UpdatedDate>,
    ) -> Self {
        let task_id = task_id.into();
        Self {
            image_name: image_name.into(),
            image_width: 0,
            image_height: 0,
            task_id,
            task_name: format!("task-{}", task_id),
            task_status: task_status.into(),
            task_updated_date: task_updated_date.into(),
            frame_index: 0,
            subset: String::new(),
            split: None,
        }
    }

    pub fn with_frame_index(mut self, frame_index: u64) -> Self {
        self.frame_index = frame_index;
        self
    }

    pub fn with_image_size(mut self, width: u32, height: u32) -> Self {
        self.image_width = width;
        self.image_height = height;
        self
    }

    pub fn with_split(mut self, split: Split) -> Self {
        self.split = Some(split);
        self
    }
}

/// Axis-aligned box in pixel coordinates (top-left / bottom-right corners).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BoxGeometry {
    pub x_tl: f64,
    pub y_tl: f64,
    pub x_br: f64,
    pub y_br: f64,
}

impl BoxGeometry {
    pub fn new(x_tl: f64, y_tl: f64, x_br: f64, y_br: f64) -> Self {
        Self {
            x_tl,
            y_tl,
            x_br,
            y_br,
        }
    }
}

/// An annotated object on an image.
///
/// The reconciliation engines never look inside; it is carried through so
/// that written snapshots keep every field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub label: String,
    pub bbox: BoxGeometry,
    #[serde(default)]
    pub created_by_username: String,
    #[serde(default)]
    pub occluded: bool,
    #[serde(default)]
    pub z_order: i64,
    #[serde(default)]
    pub rotation: f64,
    #[serde(default)]
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotation_id: Option<u64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

impl Instance {
    /// Creates a new box instance with default metadata.
    pub fn new(label: impl Into<String>, bbox: BoxGeometry) -> Self {
        Self {
            label: label.into(),
            bbox,
            created_by_username: String::new(),
            occluded: false,
            z_order: 0,
            rotation: 0.0,
            source: String::new(),
            annotation_id: None,
            attributes: BTreeMap::new(),
        }
    }

    /// Adds an attribute to the instance.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// What a record says about its image.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RecordBody {
    /// One annotated object.
    Instance(Instance),
    /// The image is part of the task but has nothing annotated.
    Empty,
}

/// One row of annotation state for an image within a task.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnnotationRecord {
    pub header: RecordHeader,
    pub body: RecordBody,
}

impl AnnotationRecord {
    /// Creates an instance record.
    pub fn instance(header: RecordHeader, instance: Instance) -> Self {
        Self {
            header,
            body: RecordBody::Instance(instance),
        }
    }

    /// Creates an annotation-free image record.
    pub fn empty(header: RecordHeader) -> Self {
        Self {
            header,
            body: RecordBody::Empty,
        }
    }

    pub fn image_name(&self) -> &str {
        &self.header.image_name
    }

    pub fn task_id(&self) -> TaskId {
        self.header.task_id
    }

    pub fn split(&self) -> Option<Split> {
        self.header.split
    }

    pub fn is_empty_image(&self) -> bool {
        matches!(self.body, RecordBody::Empty)
    }
}

/// "This image was removed inside this task."
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeletionRecord {
    pub image_name: String,
    pub task_id: TaskId,
    pub task_name: String,
    pub task_status: TaskStatus,
    pub task_updated_date: UpdatedDate,
    pub frame_index: u64,
}

impl DeletionRecord {
    pub fn new(
        image_name: impl Into<String>,
        task_id: impl Into<TaskId>,
        task_updated_date: impl Into<UpdatedDate>,
    ) -> Self {
        let task_id = task_id.into();
        Self {
            image_name: image_name.into(),
            task_id,
            task_name: format!("task-{}", task_id),
            task_status: TaskStatus::Completed,
            task_updated_date: task_updated_date.into(),
            frame_index: 0,
        }
    }

    pub fn with_status(mut self, status: impl Into<TaskStatus>) -> Self {
        self.task_status = status.into();
        self
    }

    pub fn with_frame_index(mut self, frame_index: u64) -> Self {
        self.frame_index = frame_index;
        self
    }
}

/// Everything one task contributed to a project.
#[derive(Clone, Debug, Default)]
pub struct TaskRecords {
    pub records: Vec<AnnotationRecord>,
    pub deletions: Vec<DeletionRecord>,
}

/// The flat, project-wide input of the partition engine.
#[derive(Clone, Debug, Default)]
pub struct ProjectRecords {
    pub records: Vec<AnnotationRecord>,
    pub deletions: Vec<DeletionRecord>,
}

impl ProjectRecords {
    /// Concatenates per-task results in task order.
    pub fn from_tasks(tasks: impl IntoIterator<Item = TaskRecords>) -> Self {
        let mut project = ProjectRecords::default();
        for task in tasks {
            project.records.extend(task.records);
            project.deletions.extend(task.deletions);
        }
        project
    }
}
