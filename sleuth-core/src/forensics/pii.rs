//! Indian national identifier detection.

use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use super::PiiScanner;
use crate::error::Result;
use crate::finding::{Finding, FindingKind};

/// Confidence for a PAN match.
pub const PAN_CONFIDENCE: f32 = 0.9;

/// Confidence for an Aadhaar match. Twelve-digit runs have more innocent
/// explanations than the PAN layout does.
pub const AADHAAR_CONFIDENCE: f32 = 0.8;

static PII_PATTERNS: OnceLock<PiiPatternSet> = OnceLock::new();

#[derive(Debug)]
struct PiiPatternSet {
    /// Five letters, four digits, one letter (matched on upper-cased text)
    pan: Regex,
    /// Twelve digits, optionally grouped 4-4-4
    aadhaar: Regex,
}

impl PiiPatternSet {
    fn new() -> Self {
        Self {
            pan: Regex::new(r"\b[A-Z]{5}[0-9]{4}[A-Z]\b").expect("pan regex must compile"),
            aadhaar: Regex::new(r"\b[0-9]{4}[\s-]?[0-9]{4}[\s-]?[0-9]{4}\b")
                .expect("aadhaar regex must compile"),
        }
    }
}

fn get_patterns() -> &'static PiiPatternSet {
    PII_PATTERNS.get_or_init(PiiPatternSet::new)
}

/// Regex scanner for PAN card and Aadhaar numbers.
///
/// Reports at most one finding per identifier type; the identifier itself
/// never appears in the description.
#[derive(Debug, Clone, Default)]
pub struct RegexPiiScanner;

impl RegexPiiScanner {
    pub fn new() -> Self {
        Self
    }
}

impl PiiScanner for RegexPiiScanner {
    fn scan(&self, text: &str) -> Result<Vec<Finding>> {
        let mut findings = Vec::new();
        if text.is_empty() {
            return Ok(findings);
        }

        let patterns = get_patterns();

        if patterns.pan.is_match(&text.to_uppercase()) {
            findings.push(Finding::new(
                FindingKind::Pii,
                "PAN card number detected",
                PAN_CONFIDENCE,
            )?);
        }

        let aadhaar = patterns.aadhaar.find_iter(text).any(|m| {
            m.as_str().chars().filter(char::is_ascii_digit).count() == 12
        });
        if aadhaar {
            findings.push(Finding::new(
                FindingKind::Pii,
                "Aadhaar number detected",
                AADHAAR_CONFIDENCE,
            )?);
        }

        debug!(count = findings.len(), "PII scan complete");
        Ok(findings)
    }

    fn name(&self) -> &'static str {
        "pii_scanner"
    }
}
