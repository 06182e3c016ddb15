//! Fuzz target for the partition engine.
//!
//! Any table the reader accepts must partition without panicking, and a
//! successful partition must route every record exactly once.

#![no_main]

use annorecon::partition::partition_project;
use annorecon::record::io_csv::{from_record_table_csv_slice, ReadOptions};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 10 * 1024 * 1024 {
        return;
    }

    let Ok(project) = from_record_table_csv_slice(data, &ReadOptions::default()) else {
        return;
    };
    let total = project.records.len();
    if let Ok(result) = partition_project(project) {
        assert_eq!(
            result.current.len() + result.obsolete.len() + result.in_progress.len(),
            total
        );
    }
});
