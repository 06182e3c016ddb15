//! Record model for per-image annotation state.
//!
//! Records arrive from an annotation-service adapter already normalized to
//! this model, one batch per task, and are read-only inputs to the engines.
//!
//! # Design Principles
//!
//! 1. **Tagged payloads**: an [`AnnotationRecord`] is either an annotated
//!    instance or an annotation-free image ([`RecordBody`]); code that needs
//!    to tell them apart matches exhaustively instead of probing nullable
//!    geometry fields.
//!
//! 2. **Lossless metadata**: timestamps and task statuses keep their source
//!    spelling ([`UpdatedDate`], [`TaskStatus::Other`]) so that persisted
//!    files round-trip byte for byte.
//!
//! # Example
//!
//! ```
//! use annorecon::record::{AnnotationRecord, BoxGeometry, Instance, RecordHeader};
//!
//! let record = AnnotationRecord::instance(
//!     RecordHeader::new("a.jpg", 10u64, "completed", "2026-01-01T00:00:00Z"),
//!     Instance::new("car", BoxGeometry::new(10.0, 20.0, 100.0, 200.0)),
//! );
//! assert_eq!(record.image_name(), "a.jpg");
//! ```

mod ids;
pub mod io_csv;
mod model;
mod snapshot;
mod time;

pub use ids::TaskId;
pub use model::{
    AnnotationRecord, BoxGeometry, DeletionRecord, Instance, ProjectRecords, RecordBody,
    RecordHeader, Split, TaskRecords, TaskStatus,
};
pub use snapshot::Snapshot;
pub use time::UpdatedDate;
