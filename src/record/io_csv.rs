//! Tabular CSV encoding of records, snapshots and deleted-image lists.
//!
//! One row is one record. The `instance_shape` column discriminates the row
//! kind:
//! - `box`: an annotated instance (label and the four `bbox_*` columns set)
//! - `none`: an image present in its task with no annotated instance
//! - `deleted`: the image was removed in that task (only task columns set)
//!
//! `attributes` is a JSON object string. Optional columns may be missing
//! from hand-edited files; they read back as empty.
//!
//! # Deterministic Output
//!
//! Writers emit the fixed [`CSV_COLUMNS`] header (even for empty inputs) and
//! rows in the order given, so re-running a pipeline over the same input
//! produces byte-identical files.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};

use super::model::{
    AnnotationRecord, BoxGeometry, DeletionRecord, Instance, ProjectRecords, RecordBody,
    RecordHeader, Split, TaskStatus,
};
use super::{Snapshot, TaskId, UpdatedDate};
use crate::error::AnnoreconError;

/// Column order of every file written by this module.
pub const CSV_COLUMNS: [&str; 23] = [
    "image_name",
    "image_width",
    "image_height",
    "instance_shape",
    "instance_label",
    "bbox_x_tl",
    "bbox_y_tl",
    "bbox_x_br",
    "bbox_y_br",
    "task_id",
    "task_name",
    "task_status",
    "task_updated_date",
    "created_by_username",
    "frame_id",
    "subset",
    "occluded",
    "z_order",
    "rotation",
    "source",
    "annotation_id",
    "attributes",
    "split",
];

/// Columns without which a file cannot be interpreted at all.
const REQUIRED_COLUMNS: [&str; 4] = ["image_name", "instance_shape", "task_id", "task_status"];

const TIME_COLUMN: &str = "task_updated_date";

const SHAPE_BOX: &str = "box";
const SHAPE_NONE: &str = "none";
const SHAPE_DELETED: &str = "deleted";

/// Reader options.
#[derive(Clone, Copy, Debug, Default)]
pub struct ReadOptions {
    /// Also require the `task_updated_date` column (merging by time).
    pub require_time_column: bool,
}

// ============================================================================
// CSV Schema Type (internal to this module)
// ============================================================================

/// A single row of the table.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct CsvRow {
    image_name: String,
    #[serde(deserialize_with = "lenient_u32")]
    image_width: Option<u32>,
    #[serde(deserialize_with = "lenient_u32")]
    image_height: Option<u32>,
    instance_shape: String,
    instance_label: Option<String>,
    bbox_x_tl: Option<f64>,
    bbox_y_tl: Option<f64>,
    bbox_x_br: Option<f64>,
    bbox_y_br: Option<f64>,
    #[serde(deserialize_with = "lenient_u64")]
    task_id: Option<u64>,
    task_name: String,
    task_status: String,
    task_updated_date: String,
    created_by_username: Option<String>,
    #[serde(deserialize_with = "lenient_u64")]
    frame_id: Option<u64>,
    subset: Option<String>,
    #[serde(deserialize_with = "lenient_bool")]
    occluded: Option<bool>,
    #[serde(deserialize_with = "lenient_i64")]
    z_order: Option<i64>,
    rotation: Option<f64>,
    source: Option<String>,
    #[serde(deserialize_with = "lenient_u64")]
    annotation_id: Option<u64>,
    attributes: Option<String>,
    split: Option<String>,
}

/// Integer columns written by dataframe tooling come back as `42.0` when the
/// column also holds blanks.
fn lenient_integer<'de, D>(deserializer: D) -> Result<Option<i128>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    let Some(raw) = raw.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    if let Ok(value) = raw.parse::<i128>() {
        return Ok(Some(value));
    }
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() && value.fract() == 0.0 => Ok(Some(value as i128)),
        _ => Err(serde::de::Error::custom(format!(
            "invalid integer '{}'",
            raw
        ))),
    }
}

fn lenient_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    lenient_integer(deserializer)?
        .map(|v| u64::try_from(v).map_err(|_| serde::de::Error::custom("integer out of range")))
        .transpose()
}

fn lenient_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    lenient_integer(deserializer)?
        .map(|v| u32::try_from(v).map_err(|_| serde::de::Error::custom("integer out of range")))
        .transpose()
}

fn lenient_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    lenient_integer(deserializer)?
        .map(|v| i64::try_from(v).map_err(|_| serde::de::Error::custom("integer out of range")))
        .transpose()
}

fn lenient_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some("true" | "True" | "TRUE" | "1") => Ok(Some(true)),
        Some("false" | "False" | "FALSE" | "0") => Ok(Some(false)),
        Some(other) => Err(serde::de::Error::custom(format!(
            "invalid boolean '{}'",
            other
        ))),
    }
}

// ============================================================================
// Public API: reading
// ============================================================================

/// Reads a raw record table (instances, empty images and deletion rows).
///
/// # Errors
/// Returns an error if the file cannot be read, lacks required columns, or
/// contains a row that cannot be interpreted.
pub fn read_record_table_csv(
    path: &Path,
    opts: &ReadOptions,
) -> Result<ProjectRecords, AnnoreconError> {
    let file = File::open(path).map_err(AnnoreconError::Io)?;
    read_table(BufReader::new(file), path, opts)
}

/// Reads a raw record table from a string.
pub fn from_record_table_csv_str(
    csv_str: &str,
    opts: &ReadOptions,
) -> Result<ProjectRecords, AnnoreconError> {
    read_table(csv_str.as_bytes(), Path::new("<string>"), opts)
}

/// Reads a raw record table from bytes.
///
/// Useful for fuzzing and processing raw bytes without requiring UTF-8 upfront.
pub fn from_record_table_csv_slice(
    bytes: &[u8],
    opts: &ReadOptions,
) -> Result<ProjectRecords, AnnoreconError> {
    read_table(bytes, Path::new("<bytes>"), opts)
}

/// Reads a snapshot (a current-state file without deletion rows).
pub fn read_snapshot_csv(path: &Path, opts: &ReadOptions) -> Result<Snapshot, AnnoreconError> {
    let table = read_record_table_csv(path, opts)?;
    table_to_snapshot(table, path)
}

/// Reads a snapshot from a string.
pub fn from_snapshot_csv_str(
    csv_str: &str,
    opts: &ReadOptions,
) -> Result<Snapshot, AnnoreconError> {
    let dummy_path = Path::new("<string>");
    let table = read_table(csv_str.as_bytes(), dummy_path, opts)?;
    table_to_snapshot(table, dummy_path)
}

/// Reads a deleted-image list: one image name per line, blank lines ignored.
pub fn read_deleted_txt(path: &Path) -> Result<BTreeSet<String>, AnnoreconError> {
    let content = fs::read_to_string(path).map_err(AnnoreconError::Io)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

// ============================================================================
// Public API: writing
// ============================================================================

/// Writes annotation records (a snapshot or any partition bucket) to a file.
pub fn write_records_csv(path: &Path, records: &[AnnotationRecord]) -> Result<(), AnnoreconError> {
    let file = File::create(path).map_err(AnnoreconError::Io)?;
    let rows = records.iter().map(record_to_row);
    write_rows(BufWriter::new(file), rows, path)?
        .flush()
        .map_err(AnnoreconError::Io)
}

/// Writes a snapshot to a file.
pub fn write_snapshot_csv(path: &Path, snapshot: &Snapshot) -> Result<(), AnnoreconError> {
    write_records_csv(path, snapshot.records())
}

/// Writes annotation records to a CSV string.
pub fn to_records_csv_string(records: &[AnnotationRecord]) -> Result<String, AnnoreconError> {
    let dummy_path = Path::new("<string>");
    let bytes = write_rows(Vec::new(), records.iter().map(record_to_row), dummy_path)?;
    into_utf8(bytes, dummy_path)
}

/// Writes a snapshot to a CSV string.
pub fn to_snapshot_csv_string(snapshot: &Snapshot) -> Result<String, AnnoreconError> {
    to_records_csv_string(snapshot.records())
}

/// Writes a raw record table (records first, then deletion rows) to a string.
pub fn to_record_table_csv_string(table: &ProjectRecords) -> Result<String, AnnoreconError> {
    let dummy_path = Path::new("<string>");
    let rows = table
        .records
        .iter()
        .map(record_to_row)
        .chain(table.deletions.iter().map(deletion_to_row));
    let bytes = write_rows(Vec::new(), rows, dummy_path)?;
    into_utf8(bytes, dummy_path)
}

/// Writes a deleted-image list, one name per line.
pub fn write_deleted_txt<'a>(
    path: &Path,
    names: impl IntoIterator<Item = &'a str>,
) -> Result<(), AnnoreconError> {
    let mut writer = BufWriter::new(File::create(path).map_err(AnnoreconError::Io)?);
    for name in names {
        writeln!(writer, "{}", name).map_err(AnnoreconError::Io)?;
    }
    writer.flush().map_err(AnnoreconError::Io)
}

/// Fuzz-only entrypoint for interpreting one row laid out in [`CSV_COLUMNS`] order.
#[cfg(feature = "fuzzing")]
pub fn fuzz_parse_row(fields: &[&str]) -> Result<(), AnnoreconError> {
    let path = Path::new("<fuzz>");
    let headers = csv::StringRecord::from(CSV_COLUMNS.to_vec());
    let record = csv::StringRecord::from(fields.to_vec());
    let row: CsvRow = record
        .deserialize(Some(&headers))
        .map_err(|source| AnnoreconError::CsvParse {
            path: path.to_path_buf(),
            source,
        })?;
    row_to_entry(row).map_err(|message| AnnoreconError::CsvInvalid {
        path: path.to_path_buf(),
        message,
    })?;
    Ok(())
}

// ============================================================================
// Internals
// ============================================================================

fn read_table<R: io::Read>(
    reader: R,
    path: &Path,
    opts: &ReadOptions,
) -> Result<ProjectRecords, AnnoreconError> {
    // Hand-edited files sometimes pad header names; field values stay verbatim.
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let headers = csv_reader
        .headers()
        .map_err(|source| AnnoreconError::CsvParse {
            path: path.to_path_buf(),
            source,
        })?
        .clone();
    check_columns(&headers, path, opts)?;

    let mut table = ProjectRecords::default();
    for (i, result) in csv_reader.deserialize().enumerate() {
        let row: CsvRow = result.map_err(|source| AnnoreconError::CsvParse {
            path: path.to_path_buf(),
            source,
        })?;
        // Line 1 is the header.
        let line = i + 2;
        match row_to_entry(row).map_err(|message| AnnoreconError::CsvInvalid {
            path: path.to_path_buf(),
            message: format!("row {}: {}", line, message),
        })? {
            Entry::Record(record) => table.records.push(record),
            Entry::Deletion(deletion) => table.deletions.push(deletion),
        }
    }

    Ok(table)
}

fn check_columns(
    headers: &csv::StringRecord,
    path: &Path,
    opts: &ReadOptions,
) -> Result<(), AnnoreconError> {
    let present: BTreeSet<&str> = headers.iter().map(str::trim).collect();
    let mut required: Vec<&str> = REQUIRED_COLUMNS.to_vec();
    if opts.require_time_column {
        required.push(TIME_COLUMN);
    }

    let missing: Vec<String> = required
        .into_iter()
        .filter(|column| !present.contains(column))
        .map(str::to_string)
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(AnnoreconError::MissingColumns {
            path: path.to_path_buf(),
            columns: missing,
        })
    }
}

fn table_to_snapshot(table: ProjectRecords, path: &Path) -> Result<Snapshot, AnnoreconError> {
    if let Some(deletion) = table.deletions.first() {
        return Err(AnnoreconError::CsvInvalid {
            path: path.to_path_buf(),
            message: format!(
                "snapshot contains deletion rows (first: '{}' in task {})",
                deletion.image_name, deletion.task_id
            ),
        });
    }
    Ok(Snapshot::new(table.records))
}

enum Entry {
    Record(AnnotationRecord),
    Deletion(DeletionRecord),
}

fn row_to_entry(row: CsvRow) -> Result<Entry, String> {
    if row.image_name.is_empty() {
        return Err("empty image_name".to_string());
    }
    let task_id = TaskId::new(
        row.task_id
            .ok_or_else(|| format!("missing task_id for image '{}'", row.image_name))?,
    );
    let frame_index = row.frame_id.unwrap_or(0);

    match row.instance_shape.trim() {
        SHAPE_DELETED => Ok(Entry::Deletion(DeletionRecord {
            image_name: row.image_name,
            task_id,
            task_name: row.task_name,
            task_status: TaskStatus::from(row.task_status),
            task_updated_date: UpdatedDate::new(row.task_updated_date),
            frame_index,
        })),
        shape @ (SHAPE_BOX | SHAPE_NONE) => {
            let is_box = shape == SHAPE_BOX;
            let split = match row.split.as_deref().map(str::trim) {
                None | Some("") => None,
                Some(raw) => Some(raw.parse::<Split>()?),
            };
            let header = RecordHeader {
                image_name: row.image_name,
                image_width: row.image_width.unwrap_or(0),
                image_height: row.image_height.unwrap_or(0),
                task_id,
                task_name: row.task_name,
                task_status: TaskStatus::from(row.task_status),
                task_updated_date: UpdatedDate::new(row.task_updated_date),
                frame_index,
                subset: row.subset.unwrap_or_default(),
                split,
            };
            if !is_box {
                return Ok(Entry::Record(AnnotationRecord::empty(header)));
            }

            let (Some(x_tl), Some(y_tl), Some(x_br), Some(y_br)) =
                (row.bbox_x_tl, row.bbox_y_tl, row.bbox_x_br, row.bbox_y_br)
            else {
                return Err(format!(
                    "box row for image '{}' is missing bbox coordinates",
                    header.image_name
                ));
            };
            let label = row.instance_label.ok_or_else(|| {
                format!("box row for image '{}' has no instance_label", header.image_name)
            })?;
            let attributes = match row.attributes.as_deref().map(str::trim) {
                None | Some("") => BTreeMap::new(),
                Some(raw) => serde_json::from_str::<BTreeMap<String, String>>(raw)
                    .map_err(|e| format!("invalid attributes JSON: {}", e))?,
            };

            Ok(Entry::Record(AnnotationRecord::instance(
                header,
                Instance {
                    label,
                    bbox: BoxGeometry::new(x_tl, y_tl, x_br, y_br),
                    created_by_username: row.created_by_username.unwrap_or_default(),
                    occluded: row.occluded.unwrap_or(false),
                    z_order: row.z_order.unwrap_or(0),
                    rotation: row.rotation.unwrap_or(0.0),
                    source: row.source.unwrap_or_default(),
                    annotation_id: row.annotation_id,
                    attributes,
                },
            )))
        }
        other => Err(format!(
            "unsupported instance_shape '{}' (expected box, none or deleted)",
            other
        )),
    }
}

fn record_to_row(record: &AnnotationRecord) -> CsvRow {
    let header = &record.header;
    let mut row = CsvRow {
        image_name: header.image_name.clone(),
        image_width: Some(header.image_width),
        image_height: Some(header.image_height),
        task_id: Some(header.task_id.as_u64()),
        task_name: header.task_name.clone(),
        task_status: header.task_status.as_str().to_string(),
        task_updated_date: header.task_updated_date.as_str().to_string(),
        frame_id: Some(header.frame_index),
        subset: Some(header.subset.clone()),
        split: header.split.map(|s| s.as_str().to_string()),
        ..Default::default()
    };

    match &record.body {
        RecordBody::Instance(instance) => {
            row.instance_shape = SHAPE_BOX.to_string();
            row.instance_label = Some(instance.label.clone());
            row.bbox_x_tl = Some(instance.bbox.x_tl);
            row.bbox_y_tl = Some(instance.bbox.y_tl);
            row.bbox_x_br = Some(instance.bbox.x_br);
            row.bbox_y_br = Some(instance.bbox.y_br);
            row.created_by_username = Some(instance.created_by_username.clone());
            row.occluded = Some(instance.occluded);
            row.z_order = Some(instance.z_order);
            row.rotation = Some(instance.rotation);
            row.source = Some(instance.source.clone());
            row.annotation_id = instance.annotation_id;
            // BTreeMap<String, String> always serializes.
            row.attributes = serde_json::to_string(&instance.attributes).ok();
        }
        RecordBody::Empty => {
            row.instance_shape = SHAPE_NONE.to_string();
        }
    }

    row
}

fn deletion_to_row(deletion: &DeletionRecord) -> CsvRow {
    CsvRow {
        image_name: deletion.image_name.clone(),
        instance_shape: SHAPE_DELETED.to_string(),
        task_id: Some(deletion.task_id.as_u64()),
        task_name: deletion.task_name.clone(),
        task_status: deletion.task_status.as_str().to_string(),
        task_updated_date: deletion.task_updated_date.as_str().to_string(),
        frame_id: Some(deletion.frame_index),
        ..Default::default()
    }
}

fn write_rows<W: Write>(
    writer: W,
    rows: impl Iterator<Item = CsvRow>,
    path: &Path,
) -> Result<W, AnnoreconError> {
    let mut csv_writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);

    csv_writer
        .write_record(CSV_COLUMNS)
        .map_err(|source| AnnoreconError::CsvWrite {
            path: path.to_path_buf(),
            source,
        })?;
    for row in rows {
        csv_writer
            .serialize(&row)
            .map_err(|source| AnnoreconError::CsvWrite {
                path: path.to_path_buf(),
                source,
            })?;
    }

    csv_writer
        .into_inner()
        .map_err(|e| AnnoreconError::Io(e.into_error()))
}

fn into_utf8(bytes: Vec<u8>, path: &Path) -> Result<String, AnnoreconError> {
    String::from_utf8(bytes).map_err(|e| AnnoreconError::CsvInvalid {
        path: path.to_path_buf(),
        message: format!("Invalid UTF-8 in output: {}", e),
    })
}

// ============================================================================
// Tests
// ============================================================================
