//! Fuzz target for raw record table CSV parsing.
//!
//! This fuzzer feeds arbitrary byte sequences to the CSV table reader,
//! checking for panics, crashes, or hangs.

#![no_main]

use annorecon::record::io_csv::{from_record_table_csv_slice, ReadOptions};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 10 * 1024 * 1024 {
        return;
    }

    let _ = from_record_table_csv_slice(data, &ReadOptions::default());
});
