//! Task update timestamps.
//!
//! The annotation service reports `task_updated_date` as an ISO 8601 string,
//! and files that went through other tooling may carry it with a space
//! separator or without an offset. The raw string is kept verbatim so that
//! persisted files round-trip unchanged; comparisons always go through
//! [`UpdatedDate::parse`], which normalizes to UTC.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Offset-carrying layouts accepted besides strict RFC 3339.
const OFFSET_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%dT%H:%M:%S%.f%z"];

/// Offset-less layouts, interpreted as UTC.
const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// The `task_updated_date` of a record, as found in the source data.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UpdatedDate(String);

impl UpdatedDate {
    /// Wraps a raw timestamp string.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Builds a date from an already-typed UTC timestamp.
    pub fn from_utc(at: DateTime<Utc>) -> Self {
        Self(at.to_rfc3339())
    }

    /// Returns the raw string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if no date was recorded at all.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Parses the timestamp into UTC, or `None` if it is blank or unparsable.
    pub fn parse(&self) -> Option<DateTime<Utc>> {
        let raw = self.0.trim();
        if raw.is_empty() {
            return None;
        }

        if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
            return Some(at.with_timezone(&Utc));
        }
        for format in OFFSET_FORMATS {
            if let Ok(at) = DateTime::parse_from_str(raw, format) {
                return Some(at.with_timezone(&Utc));
            }
        }
        for format in NAIVE_FORMATS {
            if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
                return Some(naive.and_utc());
            }
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
    }
}

impl From<&str> for UpdatedDate {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for UpdatedDate {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl fmt::Display for UpdatedDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
