use std::path::PathBuf;
use thiserror::Error;

use crate::record::TaskId;

/// The main error type for annorecon operations.
#[derive(Debug, Error)]
pub enum AnnoreconError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to create output directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse CSV from {path}: {source}")]
    CsvParse {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Failed to write CSV to {path}: {source}")]
    CsvWrite {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Invalid CSV data in {path}: {message}")]
    CsvInvalid { path: PathBuf, message: String },

    #[error("{path} is missing required column(s): {}", .columns.join(", "))]
    MissingColumns { path: PathBuf, columns: Vec<String> },

    #[error("Invalid task_updated_date {value:?} for image '{image_name}' in task {task_id}")]
    InvalidTimestamp {
        image_name: String,
        task_id: TaskId,
        value: String,
    },

    #[error("Image '{image_name}' has conflicting records in task {task_id}: {reason}")]
    ConflictingRecords {
        image_name: String,
        task_id: TaskId,
        reason: &'static str,
    },

    #[error("--by-time requires task_updated_date, but the {side} snapshot carries no dates")]
    MissingTimeColumn { side: &'static str },

    #[error("Failed to render JSON report: {0}")]
    ReportJson(#[from] serde_json::Error),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}
