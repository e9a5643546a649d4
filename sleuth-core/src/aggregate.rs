//! Fraud-score aggregation.
//!
//! Turns the findings reported for one submission into a [`ScanVerdict`]:
//! a clamped weighted score over the finding kinds present, plus a
//! discrete severity band.
//!
//! Scoring counts each kind once no matter how many findings of that kind
//! were reported, so it is order-independent. The verdict still keeps the
//! findings in reporting order for display and audit.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Result;
use crate::finding::{Finding, FindingKind};

/// Upper bound of the fraud score.
pub const MAX_FRAUD_SCORE: f32 = 100.0;

/// Lower edge of the MEDIUM band.
pub const MEDIUM_THRESHOLD: f32 = 30.0;

/// Lower edge of the HIGH band.
pub const HIGH_THRESHOLD: f32 = 60.0;

/// Per-kind contribution to the fraud score.
///
/// The defaults are policy values with no derivation behind them; tune
/// them through configuration rather than treating them as fixed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub duplicate_exact: f32,
    pub duplicate_near: f32,
    pub pii: f32,
    pub metadata_mismatch: f32,
    pub suspicious_tool: f32,
    pub pixel_tamper: f32,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            duplicate_exact: 40.0,
            duplicate_near: 25.0,
            pii: 20.0,
            metadata_mismatch: 15.0,
            suspicious_tool: 15.0,
            pixel_tamper: 25.0,
        }
    }
}

impl ScoreWeights {
    /// Load weights from `SLEUTH_WEIGHT_<KIND>` environment variables,
    /// falling back to the defaults for anything unset or unparsable.
    ///
    /// Negative weights are clamped to zero so that adding a finding can
    /// never lower the score.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let read = |name: &str, default: f32| {
            std::env::var(name)
                .ok()
                .and_then(|v| v.parse::<f32>().ok())
                .filter(|v| v.is_finite())
                .map(|v| v.max(0.0))
                .unwrap_or(default)
        };

        Self {
            duplicate_exact: read("SLEUTH_WEIGHT_DUPLICATE_EXACT", defaults.duplicate_exact),
            duplicate_near: read("SLEUTH_WEIGHT_DUPLICATE_NEAR", defaults.duplicate_near),
            pii: read("SLEUTH_WEIGHT_PII", defaults.pii),
            metadata_mismatch: read(
                "SLEUTH_WEIGHT_METADATA_MISMATCH",
                defaults.metadata_mismatch,
            ),
            suspicious_tool: read("SLEUTH_WEIGHT_SUSPICIOUS_TOOL", defaults.suspicious_tool),
            pixel_tamper: read("SLEUTH_WEIGHT_PIXEL_TAMPER", defaults.pixel_tamper),
        }
    }

    /// Weight contributed by a finding kind.
    pub fn weight(&self, kind: FindingKind) -> f32 {
        match kind {
            FindingKind::DuplicateExact => self.duplicate_exact,
            FindingKind::DuplicateNear => self.duplicate_near,
            FindingKind::Pii => self.pii,
            FindingKind::MetadataMismatch => self.metadata_mismatch,
            FindingKind::SuspiciousTool => self.suspicious_tool,
            FindingKind::PixelTamper => self.pixel_tamper,
        }
    }
}

/// Discretized fraud-score band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    None,
    Low,
    Medium,
    High,
}

impl Severity {
    /// Map a score to its band. Each band includes its lower edge.
    pub fn from_score(score: f32) -> Self {
        if score >= HIGH_THRESHOLD {
            Self::High
        } else if score >= MEDIUM_THRESHOLD {
            Self::Medium
        } else if score > 0.0 {
            Self::Low
        } else {
            Self::None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final verdict for one submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanVerdict {
    pub submission_id: String,
    /// Valid findings, in the order collaborators reported them
    pub findings: Vec<Finding>,
    /// Weighted score in [0, 100]
    pub fraud_score: f32,
    pub severity: Severity,
    /// Number of malformed findings that were dropped before scoring
    #[serde(default)]
    pub dropped_findings: usize,
}

impl ScanVerdict {
    /// Whether any finding of `kind` is present.
    pub fn has(&self, kind: FindingKind) -> bool {
        self.findings.iter().any(|f| f.kind == kind)
    }
}

/// Pure, deterministic finding aggregator.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignalAggregator {
    weights: ScoreWeights,
}

impl SignalAggregator {
    pub fn new(weights: ScoreWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &ScoreWeights {
        &self.weights
    }

    /// Aggregate findings, dropping (and logging) any that are malformed.
    pub fn aggregate(&self, submission_id: &str, findings: Vec<Finding>) -> ScanVerdict {
        let total = findings.len();
        let valid: Vec<Finding> = findings
            .into_iter()
            .filter(|finding| match finding.validate() {
                Ok(()) => true,
                Err(e) => {
                    warn!(submission_id, error = %e, "Dropping invalid finding");
                    false
                }
            })
            .collect();
        let dropped_findings = total - valid.len();

        self.build_verdict(submission_id, valid, dropped_findings)
    }

    /// Aggregate findings, rejecting the whole set if any finding is malformed.
    pub fn try_aggregate(
        &self,
        submission_id: &str,
        findings: Vec<Finding>,
    ) -> Result<ScanVerdict> {
        for finding in &findings {
            finding.validate()?;
        }
        Ok(self.build_verdict(submission_id, findings, 0))
    }

    /// Score a set of findings without building a verdict.
    pub fn score(&self, findings: &[Finding]) -> f32 {
        let raw: f32 = FindingKind::ALL
            .into_iter()
            .filter(|kind| findings.iter().any(|f| f.kind == *kind))
            .map(|kind| self.weights.weight(kind))
            .sum();
        raw.clamp(0.0, MAX_FRAUD_SCORE)
    }

    fn build_verdict(
        &self,
        submission_id: &str,
        findings: Vec<Finding>,
        dropped_findings: usize,
    ) -> ScanVerdict {
        let fraud_score = self.score(&findings);
        let severity = Severity::from_score(fraud_score);

        tracing::debug!(
            submission_id,
            findings = findings.len(),
            dropped_findings,
            score = fraud_score,
            severity = %severity,
            "Aggregated findings"
        );

        ScanVerdict {
            submission_id: submission_id.to_string(),
            findings,
            fraud_score,
            severity,
            dropped_findings,
        }
    }
}
