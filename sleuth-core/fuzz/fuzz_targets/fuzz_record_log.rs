#![no_main]

//! Fuzz target for record log replay
//!
//! Feeds arbitrary bytes to the frame decoder for both persisted record
//! types. Torn tails and corrupt frames must come back as values or errors,
//! never as panics.
//!
//! Run with: cargo +nightly fuzz run fuzz_record_log

use libfuzzer_sys::fuzz_target;
use sleuth_core::index::log::decode_records;
use sleuth_core::index::{HashRecord, IndexEntry};

fuzz_target!(|data: &[u8]| {
    if let Ok(decoded) = decode_records::<IndexEntry>(data) {
        assert!(decoded.valid_len <= data.len());
    }
    if let Ok(decoded) = decode_records::<HashRecord>(data) {
        assert!(decoded.valid_len <= data.len());
    }
});
