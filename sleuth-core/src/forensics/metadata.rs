//! PDF metadata consistency checks.

use std::sync::OnceLock;

use regex::{bytes, Regex};
use tracing::debug;

use super::{find_suspicious_tool, ContentKind, MetadataAnalyzer};
use crate::error::Result;
use crate::finding::{Finding, FindingKind};

/// Confidence for a creation date later than every date in the text.
pub const DATE_MISMATCH_CONFIDENCE: f32 = 0.7;

/// Confidence for an editing tool named in `/Producer` or `/Creator`.
pub const PRODUCER_TOOL_CONFIDENCE: f32 = 0.8;

/// Years outside this range are OCR noise or account numbers, not dates.
const PLAUSIBLE_YEARS: std::ops::RangeInclusive<i32> = 1900..=2100;

static METADATA_PATTERNS: OnceLock<MetadataPatterns> = OnceLock::new();

struct MetadataPatterns {
    creation_date: bytes::Regex,
    producer: bytes::Regex,
    /// Each has the year in capture group 1
    text_dates: [Regex; 4],
}

impl MetadataPatterns {
    fn new() -> Self {
        const MONTH: &str = "(?:jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*";
        Self {
            creation_date: bytes::Regex::new(r"(?-u)/CreationDate\s*\(\s*(?:D:)?([0-9]{4})")
                .expect("creation_date regex must compile"),
            producer: bytes::Regex::new(r"(?s-u)/(?:Producer|Creator)\s*\(((?:[^()\\]|\\.)*)\)")
                .expect("producer regex must compile"),
            text_dates: [
                // DD/MM/YYYY, DD-MM-YYYY
                Regex::new(r"\b[0-9]{1,2}[/-][0-9]{1,2}[/-]([0-9]{4})\b")
                    .expect("dmy regex must compile"),
                // YYYY-MM-DD, YYYY/MM/DD
                Regex::new(r"\b([0-9]{4})[/-][0-9]{1,2}[/-][0-9]{1,2}\b")
                    .expect("ymd regex must compile"),
                // 12 March 2024
                Regex::new(&format!(r"(?i)\b[0-9]{{1,2}}\s+{MONTH}\s+([0-9]{{4}})\b"))
                    .expect("day-month regex must compile"),
                // March 12, 2024
                Regex::new(&format!(r"(?i)\b{MONTH}\s+[0-9]{{1,2}},?\s+([0-9]{{4}})\b"))
                    .expect("month-day regex must compile"),
            ],
        }
    }
}

fn get_patterns() -> &'static MetadataPatterns {
    METADATA_PATTERNS.get_or_init(MetadataPatterns::new)
}

/// Compares a PDF's `/CreationDate` with the dates written in its text.
///
/// A statement dated 2023 whose file was created in 2025 was most likely
/// regenerated or edited after the fact. Non-PDF input yields no findings.
#[derive(Debug, Clone, Default)]
pub struct PdfDateMetadataAnalyzer;

impl PdfDateMetadataAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Year of the `/CreationDate` entry, if present.
    pub fn creation_year(file_bytes: &[u8]) -> Option<i32> {
        let caps = get_patterns().creation_date.captures(file_bytes)?;
        std::str::from_utf8(caps.get(1)?.as_bytes())
            .ok()?
            .parse()
            .ok()
    }

    /// Latest plausible year among the dates written in `text`.
    pub fn latest_text_year(text: &str) -> Option<i32> {
        get_patterns()
            .text_dates
            .iter()
            .flat_map(|re| re.captures_iter(text))
            .filter_map(|caps| caps.get(1)?.as_str().parse::<i32>().ok())
            .filter(|year| PLAUSIBLE_YEARS.contains(year))
            .max()
    }
}

impl MetadataAnalyzer for PdfDateMetadataAnalyzer {
    fn analyze(&self, file_bytes: &[u8], text: &str) -> Result<Vec<Finding>> {
        let mut findings = Vec::new();
        if ContentKind::sniff(file_bytes) != ContentKind::Pdf {
            return Ok(findings);
        }

        if let (Some(created), Some(latest)) =
            (Self::creation_year(file_bytes), Self::latest_text_year(text))
        {
            debug!(created, latest, "Comparing creation year with text dates");
            if created > latest {
                findings.push(Finding::new(
                    FindingKind::MetadataMismatch,
                    format!("PDF created in {created}, after the latest date in its text ({latest})"),
                    DATE_MISMATCH_CONFIDENCE,
                )?);
            }
        }

        let tool = get_patterns()
            .producer
            .captures_iter(file_bytes)
            .filter_map(|caps| caps.get(1))
            .find_map(|m| find_suspicious_tool(m.as_bytes()));
        if let Some(tool) = tool {
            findings.push(Finding::new(
                FindingKind::SuspiciousTool,
                format!("PDF producer metadata names '{tool}'"),
                PRODUCER_TOOL_CONFIDENCE,
            )?);
        }

        Ok(findings)
    }

    fn name(&self) -> &'static str {
        "metadata_analyzer"
    }
}
