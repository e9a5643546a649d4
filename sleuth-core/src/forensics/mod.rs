//! Forensic collaborators.
//!
//! Each collaborator inspects one aspect of a submission and reports zero or
//! more [`Finding`]s. They are independent of each other and of the
//! duplicate engine; the scan pipeline runs them all and records which ones
//! failed, so one broken signal never hides the others.
//!
//! Reference implementations:
//!
//! - [`Utf8TextExtractor`]: plain text and PDF literal strings
//! - [`RegexPiiScanner`]: PAN and Aadhaar identifiers
//! - [`PdfDateMetadataAnalyzer`]: PDF creation date vs dates in the text
//! - [`SignatureTamperScanner`]: editing-tool markers and error level analysis

mod metadata;
mod pii;
mod tamper;
mod text;

pub use metadata::PdfDateMetadataAnalyzer;
pub use pii::RegexPiiScanner;
pub use tamper::{SignatureTamperScanner, ELA_JPEG_QUALITY, ELA_THRESHOLD};
pub use text::Utf8TextExtractor;

use crate::error::Result;
use crate::finding::Finding;

/// Editing tools whose signatures mark a document as suspicious.
pub const SUSPICIOUS_TOOLS: [&str; 6] = [
    "canva",
    "photoshop",
    "gimp",
    "adobe",
    "illustrator",
    "framer",
];

/// Pulls plain text out of an uploaded file.
pub trait TextExtractor: Send + Sync {
    /// Best-effort extraction; returns an empty string when nothing usable
    /// is found.
    fn extract(&self, file_bytes: &[u8]) -> String;

    fn name(&self) -> &'static str;
}

/// Finds personal identifiers in extracted text.
pub trait PiiScanner: Send + Sync {
    fn scan(&self, text: &str) -> Result<Vec<Finding>>;

    fn name(&self) -> &'static str;
}

/// Cross-checks document metadata against its text.
pub trait MetadataAnalyzer: Send + Sync {
    fn analyze(&self, file_bytes: &[u8], text: &str) -> Result<Vec<Finding>>;

    fn name(&self) -> &'static str;
}

/// Looks for signs of editing in the raw file or its pixels.
pub trait TamperScanner: Send + Sync {
    fn scan(&self, file_bytes: &[u8]) -> Result<Vec<Finding>>;

    fn name(&self) -> &'static str;
}

/// Coarse payload type, sniffed from magic bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Pdf,
    Image,
    Other,
}

impl ContentKind {
    pub fn sniff(bytes: &[u8]) -> Self {
        const IMAGE_MAGIC: [&[u8]; 7] = [
            b"\x89PNG\r\n\x1a\n",
            b"\xFF\xD8\xFF",
            b"GIF87a",
            b"GIF89a",
            b"BM",
            b"II*\0",
            b"MM\0*",
        ];

        if bytes.starts_with(b"%PDF-") {
            Self::Pdf
        } else if IMAGE_MAGIC.iter().any(|magic| bytes.starts_with(magic))
            || (bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP")
        {
            Self::Image
        } else {
            Self::Other
        }
    }
}

/// First editing tool named in `haystack`, compared case-insensitively.
pub fn find_suspicious_tool(haystack: &[u8]) -> Option<&'static str> {
    let lowered = haystack.to_ascii_lowercase();
    SUSPICIOUS_TOOLS.into_iter().find(|tool| {
        lowered
            .windows(tool.len())
            .any(|window| window == tool.as_bytes())
    })
}
