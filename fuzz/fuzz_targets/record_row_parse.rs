//! Fuzz target for single-row interpretation.
//!
//! This fuzzer splits arbitrary UTF-8 input on commas and interprets the
//! fields as one full-width row, checking for panics, crashes, or hangs.

#![no_main]

use annorecon::record::io_csv::fuzz_parse_row;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 10 * 1024 * 1024 {
        return;
    }

    let Ok(line) = std::str::from_utf8(data) else {
        return;
    };

    let fields: Vec<&str> = line.split(',').collect();
    let _ = fuzz_parse_row(&fields);
});
