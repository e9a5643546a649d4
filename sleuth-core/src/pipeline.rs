//! End-to-end submission scan.
//!
//! [`ScanPipeline::scan`] runs every forensic collaborator, checks and
//! registers the submission with the [`DuplicateEngine`], and aggregates all
//! findings into one verdict. A collaborator that fails contributes no
//! findings; its failure is recorded in [`ScanReport::signals`] so that "no
//! finding" and "could not check" stay distinguishable.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::aggregate::{ScanVerdict, SignalAggregator};
use crate::duplicate::{DuplicateEngine, DuplicateKind, DuplicateVerdict, Registration};
use crate::error::{Result, SleuthError};
use crate::finding::{Finding, FindingKind};
use crate::forensics::{
    MetadataAnalyzer, PdfDateMetadataAnalyzer, PiiScanner, RegexPiiScanner,
    SignatureTamperScanner, TamperScanner, TextExtractor, Utf8TextExtractor,
};
use crate::phash::{HashAlgorithm, ImageHasher, PerceptualHash};

/// Signal name used for the duplicate engine in [`ScanReport::signals`].
pub const DUPLICATE_SIGNAL: &str = "duplicate_engine";

/// Signal name used for image hashing in [`ScanReport::signals`].
pub const IMAGE_HASH_SIGNAL: &str = "image_hasher";

/// One uploaded file.
#[derive(Debug, Clone)]
pub struct Submission {
    pub id: String,
    pub bytes: Vec<u8>,
    pub file_name: Option<String>,
    /// Caller-supplied text; skips extraction when set
    pub text: Option<String>,
}

impl Submission {
    /// New submission with a random v4 id.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            bytes,
            file_name: None,
            text: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }
}

/// Outcome of one collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SignalStatus {
    Ok,
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalReport {
    pub name: String,
    #[serde(flatten)]
    pub status: SignalStatus,
    /// Findings this signal contributed
    pub findings: usize,
}

/// Everything learned about one submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub verdict: ScanVerdict,
    /// `None` if the duplicate check itself failed
    pub duplicate: Option<DuplicateVerdict>,
    pub registration: Registration,
    /// Hex fingerprint, for image payloads
    pub perceptual_hash: Option<String>,
    pub file_name: Option<String>,
    pub text_chars: usize,
    pub signals: Vec<SignalReport>,
    pub created_at: DateTime<Utc>,
}

impl ScanReport {
    pub fn signal(&self, name: &str) -> Option<&SignalReport> {
        self.signals.iter().find(|s| s.name == name)
    }

    pub fn failed_signals(&self) -> impl Iterator<Item = &SignalReport> {
        self.signals
            .iter()
            .filter(|s| matches!(s.status, SignalStatus::Failed { .. }))
    }
}

/// Convert a duplicate verdict into the finding the aggregator scores.
pub fn duplicate_finding(verdict: &DuplicateVerdict) -> Option<Finding> {
    let matched = verdict.matched_submission.as_deref().unwrap_or("unknown");
    let (kind, description) = match verdict.kind {
        DuplicateKind::Unique => return None,
        DuplicateKind::ExactDuplicate => (
            FindingKind::DuplicateExact,
            format!("Identical image already submitted as {matched}"),
        ),
        DuplicateKind::NearDuplicate => (
            FindingKind::DuplicateNear,
            format!("Near-duplicate of submission {matched}"),
        ),
    };

    match Finding::new(kind, description, verdict.confidence.clamp(0.0, 1.0)) {
        Ok(finding) => Some(finding),
        Err(e) => {
            warn!(error = %e, "Dropping malformed duplicate finding");
            None
        }
    }
}

/// Runs collaborators, the duplicate engine and the aggregator.
pub struct ScanPipeline {
    extractor: Arc<dyn TextExtractor>,
    pii: Arc<dyn PiiScanner>,
    metadata: Arc<dyn MetadataAnalyzer>,
    tamper: Arc<dyn TamperScanner>,
    image_hasher: Option<Arc<dyn ImageHasher>>,
    engine: Arc<DuplicateEngine>,
    aggregator: SignalAggregator,
}

impl ScanPipeline {
    /// Start a builder with the reference collaborators.
    pub fn builder(engine: Arc<DuplicateEngine>) -> ScanPipelineBuilder {
        ScanPipelineBuilder::new(engine)
    }

    pub fn engine(&self) -> &Arc<DuplicateEngine> {
        &self.engine
    }

    pub fn aggregator(&self) -> &SignalAggregator {
        &self.aggregator
    }

    pub fn image_hasher(&self) -> Option<&Arc<dyn ImageHasher>> {
        self.image_hasher.as_ref()
    }

    /// Scan and register one submission.
    #[instrument(skip_all, fields(submission_id = %submission.id, bytes = submission.bytes.len()))]
    pub async fn scan(&self, submission: Submission) -> ScanReport {
        let mut signals = Vec::new();
        let mut findings = Vec::new();

        let text = match submission.text {
            Some(text) => text,
            None => {
                let text = self.extractor.extract(&submission.bytes);
                signals.push(SignalReport {
                    name: self.extractor.name().to_string(),
                    status: SignalStatus::Ok,
                    findings: 0,
                });
                text
            }
        };

        record(
            &mut signals,
            &mut findings,
            self.pii.name(),
            self.pii.scan(&text),
        );
        record(
            &mut signals,
            &mut findings,
            self.metadata.name(),
            self.metadata.analyze(&submission.bytes, &text),
        );
        record(
            &mut signals,
            &mut findings,
            self.tamper.name(),
            self.tamper.scan(&submission.bytes),
        );

        let image_hash = self.hash_image(&submission.bytes, &mut signals);

        let (duplicate, registration) = match self
            .engine
            .check_and_register(&submission.id, &text, image_hash.as_ref())
            .await
        {
            Ok(verdict) => {
                let finding = duplicate_finding(&verdict);
                signals.push(SignalReport {
                    name: DUPLICATE_SIGNAL.to_string(),
                    status: SignalStatus::Ok,
                    findings: usize::from(finding.is_some()),
                });
                findings.extend(finding);
                let registration = verdict.registration.clone();
                (Some(verdict), registration)
            }
            Err(e) => {
                error!(error = %e, "Duplicate check failed, submission not indexed");
                let reason = e.to_string();
                signals.push(SignalReport {
                    name: DUPLICATE_SIGNAL.to_string(),
                    status: SignalStatus::Failed {
                        reason: reason.clone(),
                    },
                    findings: 0,
                });
                (None, Registration::Failed { reason })
            }
        };

        let verdict = self.aggregator.aggregate(&submission.id, findings);
        info!(
            score = verdict.fraud_score,
            severity = %verdict.severity,
            findings = verdict.findings.len(),
            "Scan complete"
        );

        ScanReport {
            verdict,
            duplicate,
            registration,
            perceptual_hash: image_hash.map(|h| h.to_hex()),
            file_name: submission.file_name,
            text_chars: text.chars().count(),
            signals,
            created_at: Utc::now(),
        }
    }

    fn hash_image(&self, bytes: &[u8], signals: &mut Vec<SignalReport>) -> Option<PerceptualHash> {
        let hasher = self.image_hasher.as_ref()?;
        if !hasher.supports(bytes) {
            return None;
        }

        let (hash, status) = match hasher.hash_bytes(bytes) {
            Ok(hash) => (Some(hash), SignalStatus::Ok),
            Err(e) => {
                warn!(error = %e, "Image hashing failed");
                (
                    None,
                    SignalStatus::Failed {
                        reason: e.to_string(),
                    },
                )
            }
        };
        signals.push(SignalReport {
            name: IMAGE_HASH_SIGNAL.to_string(),
            status,
            findings: 0,
        });
        hash
    }
}

fn record(
    signals: &mut Vec<SignalReport>,
    findings: &mut Vec<Finding>,
    name: &str,
    outcome: Result<Vec<Finding>>,
) {
    let (status, count) = match outcome {
        Ok(found) => {
            let count = found.len();
            findings.extend(found);
            (SignalStatus::Ok, count)
        }
        Err(e) => {
            warn!(signal = name, error = %e, "Forensic signal failed");
            (
                SignalStatus::Failed {
                    reason: e.to_string(),
                },
                0,
            )
        }
    };
    signals.push(SignalReport {
        name: name.to_string(),
        status,
        findings: count,
    });
}

/// Builder for [`ScanPipeline`].
pub struct ScanPipelineBuilder {
    extractor: Arc<dyn TextExtractor>,
    pii: Arc<dyn PiiScanner>,
    metadata: Arc<dyn MetadataAnalyzer>,
    tamper: Arc<dyn TamperScanner>,
    image_hasher: Option<Arc<dyn ImageHasher>>,
    engine: Arc<DuplicateEngine>,
    aggregator: SignalAggregator,
}

impl ScanPipelineBuilder {
    fn new(engine: Arc<DuplicateEngine>) -> Self {
        Self {
            extractor: Arc::new(Utf8TextExtractor::new()),
            pii: Arc::new(RegexPiiScanner::new()),
            metadata: Arc::new(PdfDateMetadataAnalyzer::new()),
            tamper: Arc::new(SignatureTamperScanner::new()),
            image_hasher: default_image_hasher(engine.config().hash_algorithm),
            engine,
            aggregator: SignalAggregator::default(),
        }
    }

    pub fn with_text_extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_pii_scanner(mut self, scanner: Arc<dyn PiiScanner>) -> Self {
        self.pii = scanner;
        self
    }

    pub fn with_metadata_analyzer(mut self, analyzer: Arc<dyn MetadataAnalyzer>) -> Self {
        self.metadata = analyzer;
        self
    }

    pub fn with_tamper_scanner(mut self, scanner: Arc<dyn TamperScanner>) -> Self {
        self.tamper = scanner;
        self
    }

    pub fn with_image_hasher(mut self, hasher: Arc<dyn ImageHasher>) -> Self {
        self.image_hasher = Some(hasher);
        self
    }

    /// Skip image hashing entirely.
    pub fn without_image_hasher(mut self) -> Self {
        self.image_hasher = None;
        self
    }

    pub fn with_aggregator(mut self, aggregator: SignalAggregator) -> Self {
        self.aggregator = aggregator;
        self
    }

    /// Finish the pipeline.
    ///
    /// Fails when the image hasher disagrees with the engine's hash set:
    /// [`SleuthError::HashLengthMismatch`] for a different bit length,
    /// [`SleuthError::ConfigError`] for a different algorithm.
    pub fn build(self) -> Result<ScanPipeline> {
        if let Some(hasher) = &self.image_hasher {
            let config = self.engine.config();
            let expected = self.engine.hashes().hash_bits();
            if hasher.bit_len() != expected {
                return Err(SleuthError::HashLengthMismatch {
                    expected,
                    actual: hasher.bit_len(),
                });
            }
            if hasher.algorithm() != config.hash_algorithm {
                return Err(SleuthError::ConfigError(format!(
                    "image hasher uses {} but the engine stores {} hashes",
                    hasher.algorithm(),
                    config.hash_algorithm
                )));
            }
        }

        Ok(ScanPipeline {
            extractor: self.extractor,
            pii: self.pii,
            metadata: self.metadata,
            tamper: self.tamper,
            image_hasher: self.image_hasher,
            engine: self.engine,
            aggregator: self.aggregator,
        })
    }
}

#[cfg(feature = "perceptual-hash")]
fn default_image_hasher(algorithm: HashAlgorithm) -> Option<Arc<dyn ImageHasher>> {
    Some(Arc::new(crate::phash::PerceptualHasher::new(algorithm)))
}

#[cfg(not(feature = "perceptual-hash"))]
fn default_image_hasher(_algorithm: HashAlgorithm) -> Option<Arc<dyn ImageHasher>> {
    None
}
