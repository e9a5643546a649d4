#![no_main]

//! Fuzz target for text extraction and forensic scanners
//!
//! Uploaded files are attacker-controlled. Extraction and every scanner
//! must handle arbitrary bytes, including malformed PDF literals.
//!
//! Run with: cargo +nightly fuzz run fuzz_forensics

use libfuzzer_sys::fuzz_target;
use sleuth_core::forensics::{
    MetadataAnalyzer, PdfDateMetadataAnalyzer, PiiScanner, RegexPiiScanner,
    SignatureTamperScanner, TamperScanner, TextExtractor, Utf8TextExtractor,
};

fuzz_target!(|data: &[u8]| {
    let text = Utf8TextExtractor::new().extract(data);
    let _ = RegexPiiScanner::new().scan(&text);
    let _ = PdfDateMetadataAnalyzer::new().analyze(data, &text);
    let _ = SignatureTamperScanner::new().scan(data);
});
