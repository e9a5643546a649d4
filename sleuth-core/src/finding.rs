//! Forensic findings.
//!
//! A [`Finding`] is the fixed-shape output every forensic signal produces,
//! whether it comes from the duplicate engine or from an external
//! collaborator such as the PII scanner.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SleuthError};

/// Category of a forensic signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FindingKind {
    /// Personal identifier embedded in the document text
    Pii,
    /// Document metadata disagrees with dates found in the text
    MetadataMismatch,
    /// Editing-tool signature found in metadata or raw bytes
    SuspiciousTool,
    /// Pixel-level manipulation detected
    PixelTamper,
    /// Identical content was submitted before
    DuplicateExact,
    /// Visually or textually equivalent content was submitted before
    DuplicateNear,
}

impl FindingKind {
    /// All kinds, in scoring-table order.
    pub const ALL: [FindingKind; 6] = [
        FindingKind::DuplicateExact,
        FindingKind::DuplicateNear,
        FindingKind::Pii,
        FindingKind::MetadataMismatch,
        FindingKind::SuspiciousTool,
        FindingKind::PixelTamper,
    ];

    /// Stable wire name (e.g. `"DUPLICATE_NEAR"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pii => "PII",
            Self::MetadataMismatch => "METADATA_MISMATCH",
            Self::SuspiciousTool => "SUSPICIOUS_TOOL",
            Self::PixelTamper => "PIXEL_TAMPER",
            Self::DuplicateExact => "DUPLICATE_EXACT",
            Self::DuplicateNear => "DUPLICATE_NEAR",
        }
    }
}

impl fmt::Display for FindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FindingKind {
    type Err = SleuthError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        FindingKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| SleuthError::InvalidFinding(format!("unknown finding kind '{s}'")))
    }
}

/// A single forensic signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub kind: FindingKind,
    pub description: String,
    /// Confidence in [0, 1]
    pub confidence: f32,
}

impl Finding {
    /// Create a finding, rejecting confidences outside [0, 1].
    pub fn new(kind: FindingKind, description: impl Into<String>, confidence: f32) -> Result<Self> {
        let finding = Self {
            kind,
            description: description.into(),
            confidence,
        };
        finding.validate()?;
        Ok(finding)
    }

    /// Check the confidence invariant.
    ///
    /// Findings that arrive over the wire bypass [`Finding::new`], so the
    /// aggregator re-validates everything it scores.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(SleuthError::InvalidFinding(format!(
                "{} confidence {} is outside [0, 1]",
                self.kind, self.confidence
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_wire_names() {
        let json = serde_json::to_string(&FindingKind::MetadataMismatch).unwrap();
        assert_eq!(json, "\"METADATA_MISMATCH\"");

        let kind: FindingKind = serde_json::from_str("\"DUPLICATE_NEAR\"").unwrap();
        assert_eq!(kind, FindingKind::DuplicateNear);
    }

    #[test]
    fn test_kind_from_str_is_lenient() {
        assert_eq!(
            "pixel-tamper".parse::<FindingKind>().unwrap(),
            FindingKind::PixelTamper
        );
        assert_eq!("PII".parse::<FindingKind>().unwrap(), FindingKind::Pii);
        assert!("FORGERY".parse::<FindingKind>().is_err());
    }

    #[test]
    fn test_confidence_bounds() {
        assert!(Finding::new(FindingKind::Pii, "PAN", 0.0).is_ok());
        assert!(Finding::new(FindingKind::Pii, "PAN", 1.0).is_ok());
        assert!(matches!(
            Finding::new(FindingKind::Pii, "PAN", 1.01),
            Err(SleuthError::InvalidFinding(_))
        ));
        assert!(Finding::new(FindingKind::Pii, "PAN", -0.1).is_err());
        assert!(Finding::new(FindingKind::Pii, "PAN", f32::NAN).is_err());
    }
}
