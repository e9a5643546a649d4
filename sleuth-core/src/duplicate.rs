//! Duplicate detection across all prior submissions.
//!
//! [`DuplicateEngine`] owns a [`SimilarityIndex`] and a [`PerceptualHashSet`]
//! and answers, for each new submission, whether the same content (or
//! something equivalent) was registered before. Every checked submission is
//! then registered itself, so the next one can match against it.
//!
//! # Ordering
//!
//! Embedding happens before any lock is taken. A registration then takes
//! the hash set's write lock followed by the index's, always in that order,
//! and holds both across lookup and writes. Pure reads take one read lock at
//! a time. Of two concurrent identical submissions at most one is `Unique`.
//!
//! The text is written before the hash, and the hash only once the text is
//! durable. If the hash write fails, the text entry is truncated back out
//! of its log, so a failed registration stores nothing.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument};

use crate::config::EngineConfig;
use crate::embedding::EmbeddingProvider;
use crate::error::{Result, SleuthError};
use crate::index::{HashMatch, PerceptualHashSet, SearchHit, SimilarityIndex, StoreManifest};
use crate::phash::PerceptualHash;

/// Duplicate classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DuplicateKind {
    Unique,
    NearDuplicate,
    ExactDuplicate,
}

impl DuplicateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unique => "UNIQUE",
            Self::NearDuplicate => "NEAR_DUPLICATE",
            Self::ExactDuplicate => "EXACT_DUPLICATE",
        }
    }
}

impl std::fmt::Display for DuplicateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a checked submission was stored for future comparisons.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Registration {
    /// Everything registrable reached durable storage
    Committed,
    /// Nothing new to store (read-only check, empty content, or known hash
    /// with no text)
    Skipped,
    /// A write failed and nothing was stored; the detection result still
    /// stands
    Failed { reason: String },
}

impl Registration {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Result of a duplicate check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateVerdict {
    pub kind: DuplicateKind,
    /// 1.0 for exact, the match score for near, 0.0 for unique
    pub confidence: f32,
    pub matched_submission: Option<String>,
    /// Best cosine score against prior texts, when text was searched
    pub text_score: Option<f32>,
    /// Hamming distance to the closest prior image, when one was in range
    pub image_distance: Option<u32>,
    pub registration: Registration,
}

impl DuplicateVerdict {
    pub fn is_duplicate(&self) -> bool {
        self.kind != DuplicateKind::Unique
    }
}

/// Index sizes and settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineStats {
    pub indexed_texts: usize,
    pub indexed_hashes: usize,
    pub dimension: usize,
    pub hash_bits: u32,
    pub duplicate_threshold: f32,
    pub near_hash_distance: u32,
    pub embedding_provider: String,
    pub persistent: bool,
}

/// Content-addressable duplicate detector.
pub struct DuplicateEngine {
    config: EngineConfig,
    embedder: Arc<dyn EmbeddingProvider>,
    index: SimilarityIndex,
    hashes: PerceptualHashSet,
}

impl DuplicateEngine {
    /// Open the engine, restoring state from `config.data_dir` if set.
    ///
    /// A data directory remembers the embedding provider and hash settings
    /// it was first opened with; reopening it with anything else fails with
    /// [`SleuthError::ConfigError`] before either log is touched.
    pub fn open(config: EngineConfig, embedder: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        config.validate()?;

        let manifest = StoreManifest {
            embedding_provider: embedder.provider_id(),
            dimension: embedder.dimension(),
            hash_algorithm: config.hash_algorithm,
            hash_bits: config.hash_bits,
        };
        let manifest_path = config.manifest_path();
        let stored = match &manifest_path {
            Some(path) => StoreManifest::load(path)?,
            None => None,
        };
        if let Some(stored) = &stored {
            stored.ensure_matches(&manifest)?;
        }

        let index = SimilarityIndex::open(embedder.dimension(), config.vectors_path().as_deref())?;
        let hashes = PerceptualHashSet::open(config.hash_bits, config.hashes_path().as_deref())?;

        if let (Some(path), None) = (&manifest_path, &stored) {
            manifest.store(path)?;
        }

        info!(
            data_dir = ?config.data_dir,
            texts = index.len(),
            hashes = hashes.len(),
            provider = %embedder.provider_id(),
            "Duplicate engine ready"
        );

        Ok(Self {
            config,
            embedder,
            index,
            hashes,
        })
    }

    /// In-memory engine, ignoring any configured data directory.
    pub fn ephemeral(config: EngineConfig, embedder: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        Self::open(
            EngineConfig {
                data_dir: None,
                ..config
            },
            embedder,
        )
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn index(&self) -> &SimilarityIndex {
        &self.index
    }

    pub fn hashes(&self) -> &PerceptualHashSet {
        &self.hashes
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            indexed_texts: self.index.len(),
            indexed_hashes: self.hashes.len(),
            dimension: self.index.dimension(),
            hash_bits: self.hashes.hash_bits(),
            duplicate_threshold: self.config.duplicate_threshold,
            near_hash_distance: self.config.near_hash_distance,
            embedding_provider: self.embedder.provider_id(),
            persistent: self.config.data_dir.is_some(),
        }
    }

    /// Embed `text` and check the vector's dimension. Whitespace-only text
    /// is treated as absent.
    async fn embed(&self, text: &str) -> Result<Option<Vec<f32>>> {
        if text.trim().is_empty() {
            return Ok(None);
        }

        let vector = self.embedder.embed(text).await?;
        if vector.len() != self.index.dimension() {
            return Err(SleuthError::DimensionMismatch {
                expected: self.index.dimension(),
                actual: vector.len(),
            });
        }
        Ok(Some(vector))
    }

    /// Classify a submission against prior ones, then register it.
    ///
    /// Errors are returned only for failures before any state changed
    /// (embedding, dimension or hash-length mismatch). Storage failures
    /// after detection are reported in [`DuplicateVerdict::registration`].
    #[instrument(
        skip(self, text, image_hash),
        fields(chars = text.len(), has_image = image_hash.is_some())
    )]
    pub async fn check_and_register(
        &self,
        submission_id: &str,
        text: &str,
        image_hash: Option<&PerceptualHash>,
    ) -> Result<DuplicateVerdict> {
        if let Some(hash) = image_hash {
            self.hashes.check_length(hash)?;
        }
        let vector = match self.embed(text).await? {
            Some(vector) => Some(self.index.prepare(&vector)?),
            None => None,
        };

        // Hash set first, then index
        let mut image = image_hash.map(|hash| (hash, self.hashes.writer()));
        let mut text_entry = vector.map(|vector| (vector, self.index.writer()));

        let image_match = image
            .as_ref()
            .and_then(|(hash, writer)| writer.nearest(hash, self.config.near_hash_distance));
        let text_match = text_entry
            .as_ref()
            .map(|(vector, writer)| writer.best_match(vector));

        let mut failures = Vec::new();
        let mut text_stored = false;
        if let Some((vector, writer)) = text_entry.as_mut() {
            match writer.append(std::mem::take(vector), submission_id) {
                Ok(_) => text_stored = true,
                Err(e) => failures.push(format!("index: {e}")),
            }
        }

        let mut hash_stored = false;
        let known_hash = image_match.as_ref().is_some_and(HashMatch::is_exact);
        match image.as_mut() {
            Some((hash, writer)) if failures.is_empty() && !known_hash => {
                match writer.append(hash, submission_id) {
                    Ok(()) => hash_stored = true,
                    Err(e) => {
                        failures.push(format!("hash set: {e}"));
                        if let Some((_, writer)) = text_entry.as_mut() {
                            if let Err(e) = writer.rollback_last() {
                                failures.push(format!("index rollback: {e}"));
                            }
                        }
                    }
                }
            }
            _ => {}
        }
        drop(text_entry);
        drop(image);

        let registration = if !failures.is_empty() {
            let reason = failures.join("; ");
            error!(submission_id, %reason, "Registration failed, submission not stored");
            Registration::Failed { reason }
        } else if text_stored || hash_stored {
            Registration::Committed
        } else {
            Registration::Skipped
        };

        let verdict = self.classify(image_match, text_match, registration);
        info!(
            submission_id,
            kind = %verdict.kind,
            confidence = verdict.confidence,
            matched = ?verdict.matched_submission,
            "Duplicate check complete"
        );
        Ok(verdict)
    }

    /// Classify without registering anything.
    pub async fn check(
        &self,
        text: &str,
        image_hash: Option<&PerceptualHash>,
    ) -> Result<DuplicateVerdict> {
        self.check_with_distance(text, image_hash, self.config.near_hash_distance)
            .await
    }

    /// Read-only check with an explicit Hamming bound.
    pub async fn check_with_distance(
        &self,
        text: &str,
        image_hash: Option<&PerceptualHash>,
        max_distance: u32,
    ) -> Result<DuplicateVerdict> {
        let image_match = match image_hash {
            Some(hash) => self.hashes.find_near(hash, max_distance)?,
            None => None,
        };
        let text_match = match self.embed(text).await? {
            Some(vector) => Some(self.index.search(&vector)?),
            None => None,
        };

        let verdict = self.classify(image_match, text_match, Registration::Skipped);
        debug!(kind = %verdict.kind, "Read-only duplicate check");
        Ok(verdict)
    }

    fn classify(
        &self,
        image_match: Option<HashMatch>,
        text_match: Option<SearchHit>,
        registration: Registration,
    ) -> DuplicateVerdict {
        let text_score = text_match.as_ref().map(|hit| hit.score);
        let image_distance = image_match.as_ref().map(|m| m.distance);

        let mut verdict = DuplicateVerdict {
            kind: DuplicateKind::Unique,
            confidence: 0.0,
            matched_submission: None,
            text_score,
            image_distance,
            registration,
        };

        if let Some(found) = &image_match {
            if found.is_exact() {
                verdict.kind = DuplicateKind::ExactDuplicate;
                verdict.confidence = 1.0;
                verdict.matched_submission = Some(found.submission_id.clone());
                return verdict;
            }
        }

        let image_candidate = image_match.map(|found| {
            let bits = self.hashes.hash_bits() as f32;
            (1.0 - found.distance as f32 / bits, found.submission_id)
        });
        let text_candidate = text_match.and_then(|hit| match hit.submission_id {
            Some(id) if hit.score >= self.config.duplicate_threshold => {
                Some((hit.score.min(1.0), id))
            }
            _ => None,
        });

        let best = match (image_candidate, text_candidate) {
            (Some(image), Some(text)) => Some(if text.0 > image.0 { text } else { image }),
            (image, text) => image.or(text),
        };

        if let Some((confidence, submission)) = best {
            verdict.kind = DuplicateKind::NearDuplicate;
            verdict.confidence = confidence;
            verdict.matched_submission = Some(submission);
        }
        verdict
    }
}

impl std::fmt::Debug for DuplicateEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuplicateEngine")
            .field("config", &self.config)
            .field("embedder", &self.embedder.provider_id())
            .field("index", &self.index)
            .field("hashes", &self.hashes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashingEmbedder;
    use crate::phash::HashAlgorithm;
    use async_trait::async_trait;

    fn engine(config: EngineConfig) -> DuplicateEngine {
        DuplicateEngine::ephemeral(config, Arc::new(HashingEmbedder::new(64))).unwrap()
    }

    fn hash(bytes: [u8; 8]) -> PerceptualHash {
        PerceptualHash::from_bytes(bytes.to_vec(), HashAlgorithm::Blockhash64)
    }

    /// Returns a vector of the wrong length.
    struct BrokenEmbedder;

    #[async_trait]
    impl EmbeddingProvider for BrokenEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0; 3])
        }
        fn dimension(&self) -> usize {
            8
        }
        fn provider_id(&self) -> String {
            "broken".into()
        }
    }

    #[tokio::test]
    async fn test_first_unique_second_duplicate() {
        let engine = engine(EngineConfig::default());
        let text = "Invoice #12345, amount 500";

        let first = engine.check_and_register("a", text, None).await.unwrap();
        assert_eq!(first.kind, DuplicateKind::Unique);
        assert_eq!(first.confidence, 0.0);
        assert_eq!(first.registration, Registration::Committed);

        let second = engine.check_and_register("b", text, None).await.unwrap();
        assert_eq!(second.kind, DuplicateKind::NearDuplicate);
        assert!(second.confidence > 0.99);
        assert_eq!(second.matched_submission.as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn test_exact_image_duplicate() {
        let engine = engine(EngineConfig::default());
        let h = hash([3; 8]);

        let first = engine.check_and_register("a", "", Some(&h)).await.unwrap();
        assert_eq!(first.kind, DuplicateKind::Unique);

        let second = engine
            .check_and_register("b", "totally different words", Some(&h))
            .await
            .unwrap();
        assert_eq!(second.kind, DuplicateKind::ExactDuplicate);
        assert_eq!(second.confidence, 1.0);
        assert_eq!(second.matched_submission.as_deref(), Some("a"));
        // text is still registered
        assert_eq!(second.registration, Registration::Committed);
        assert_eq!(engine.stats().indexed_texts, 1);
        assert_eq!(engine.stats().indexed_hashes, 1);
    }

    #[tokio::test]
    async fn test_known_hash_without_text_is_skipped() {
        let engine = engine(EngineConfig::default());
        let h = hash([3; 8]);
        engine.check_and_register("a", "", Some(&h)).await.unwrap();

        let again = engine.check_and_register("b", "", Some(&h)).await.unwrap();
        assert_eq!(again.registration, Registration::Skipped);
    }

    #[tokio::test]
    async fn test_near_image_match_when_enabled() {
        let config = EngineConfig {
            near_hash_distance: 4,
            ..EngineConfig::default()
        };
        let engine = engine(config);
        engine
            .check_and_register("a", "", Some(&hash([0; 8])))
            .await
            .unwrap();

        let near = engine
            .check_and_register("b", "", Some(&hash([0b11, 0, 0, 0, 0, 0, 0, 0])))
            .await
            .unwrap();
        assert_eq!(near.kind, DuplicateKind::NearDuplicate);
        assert_eq!(near.image_distance, Some(2));
        assert!((near.confidence - (1.0 - 2.0 / 64.0)).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_near_image_ignored_by_default() {
        let engine = engine(EngineConfig::default());
        engine
            .check_and_register("a", "", Some(&hash([0; 8])))
            .await
            .unwrap();
        let other = engine
            .check_and_register("b", "", Some(&hash([1, 0, 0, 0, 0, 0, 0, 0])))
            .await
            .unwrap();
        assert_eq!(other.kind, DuplicateKind::Unique);
    }

    #[tokio::test]
    async fn test_below_threshold_is_unique() {
        let engine = engine(EngineConfig::default());
        engine
            .check_and_register("a", "Invoice 12345 amount 500", None)
            .await
            .unwrap();
        let other = engine
            .check_and_register("b", "Salary slip for April, net pay 42000", None)
            .await
            .unwrap();
        assert_eq!(other.kind, DuplicateKind::Unique);
        assert!(other.text_score.unwrap() < 0.90);
    }

    #[tokio::test]
    async fn test_empty_submission_skipped() {
        let engine = engine(EngineConfig::default());
        let verdict = engine.check_and_register("a", "   ", None).await.unwrap();
        assert_eq!(verdict.kind, DuplicateKind::Unique);
        assert_eq!(verdict.registration, Registration::Skipped);
        assert!(verdict.text_score.is_none());
    }

    #[tokio::test]
    async fn test_check_is_read_only() {
        let engine = engine(EngineConfig::default());
        let text = "Invoice #12345, amount 500";
        engine.check_and_register("a", text, None).await.unwrap();

        let verdict = engine.check(text, None).await.unwrap();
        assert_eq!(verdict.kind, DuplicateKind::NearDuplicate);
        assert_eq!(verdict.registration, Registration::Skipped);
        assert_eq!(engine.stats().indexed_texts, 1);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_mutates_nothing() {
        let engine =
            DuplicateEngine::ephemeral(EngineConfig::default(), Arc::new(BrokenEmbedder)).unwrap();
        let result = engine
            .check_and_register("a", "some text", Some(&hash([5; 8])))
            .await;
        assert!(matches!(
            result,
            Err(SleuthError::DimensionMismatch {
                expected: 8,
                actual: 3
            })
        ));
        assert_eq!(engine.stats().indexed_hashes, 0);
        assert_eq!(engine.stats().indexed_texts, 0);
    }

    #[tokio::test]
    async fn test_wrong_hash_length_rejected() {
        let engine = engine(EngineConfig::default());
        let short = PerceptualHash::from_bytes(vec![1; 4], HashAlgorithm::Blockhash64);
        assert!(matches!(
            engine.check_and_register("a", "text", Some(&short)).await,
            Err(SleuthError::HashLengthMismatch { .. })
        ));
        assert_eq!(engine.stats().indexed_texts, 0);
    }

    fn open_in(dir: &std::path::Path) -> DuplicateEngine {
        DuplicateEngine::open(
            EngineConfig::default().with_data_dir(dir),
            Arc::new(HashingEmbedder::new(64)),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_persistence_failure_reported() {
        let dir = tempfile::tempdir().unwrap();
        let engine = open_in(dir.path());
        engine.check_and_register("a", "first text", None).await.unwrap();

        engine.index.fail_appends();
        let verdict = engine
            .check_and_register("b", "first text", None)
            .await
            .unwrap();
        assert_eq!(verdict.kind, DuplicateKind::NearDuplicate);
        assert!(verdict.registration.is_failed());
        assert_eq!(engine.stats().indexed_texts, 1);
    }

    #[tokio::test]
    async fn test_failed_text_write_keeps_hash_out() {
        let dir = tempfile::tempdir().unwrap();
        let h = hash([7; 8]);
        {
            let engine = open_in(dir.path());
            engine.check_and_register("a", "first text", None).await.unwrap();

            engine.index.fail_appends();
            let verdict = engine
                .check_and_register("b", "a receipt with a photo", Some(&h))
                .await
                .unwrap();
            assert!(verdict.registration.is_failed());
            assert_eq!(engine.stats().indexed_hashes, 0);
        }

        // Retrying the same submission must not match itself
        let engine = open_in(dir.path());
        assert_eq!(engine.stats().indexed_hashes, 0);
        assert_eq!(engine.stats().indexed_texts, 1);
        let retry = engine
            .check_and_register("b", "a receipt with a photo", Some(&h))
            .await
            .unwrap();
        assert_eq!(retry.kind, DuplicateKind::Unique);
        assert_eq!(retry.registration, Registration::Committed);
    }

    #[tokio::test]
    async fn test_failed_hash_write_rolls_back_text() {
        let dir = tempfile::tempdir().unwrap();
        let h = hash([8; 8]);
        {
            let engine = open_in(dir.path());
            engine.hashes.fail_appends();
            let verdict = engine
                .check_and_register("a", "scanned payslip for March", Some(&h))
                .await
                .unwrap();
            assert!(verdict.registration.is_failed());
            assert_eq!(engine.stats().indexed_texts, 0);
            assert_eq!(engine.stats().indexed_hashes, 0);
        }

        let engine = open_in(dir.path());
        assert_eq!(engine.stats().indexed_texts, 0);
        let retry = engine
            .check_and_register("a2", "scanned payslip for March", Some(&h))
            .await
            .unwrap();
        assert_eq!(retry.kind, DuplicateKind::Unique);
        assert_eq!(retry.registration, Registration::Committed);
    }

    struct OtherModel;

    #[async_trait]
    impl EmbeddingProvider for OtherModel {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            HashingEmbedder::new(64).embed(text).await
        }
        fn dimension(&self) -> usize {
            64
        }
        fn provider_id(&self) -> String {
            "other-model".into()
        }
    }

    #[tokio::test]
    async fn test_reopen_with_other_provider_rejected() {
        let dir = tempfile::tempdir().unwrap();
        open_in(dir.path())
            .check_and_register("a", "first text", None)
            .await
            .unwrap();

        let err = DuplicateEngine::open(
            EngineConfig::default().with_data_dir(dir.path()),
            Arc::new(OtherModel),
        )
        .unwrap_err();
        assert!(matches!(err, SleuthError::ConfigError(_)));
        assert!(err.to_string().contains("other-model"));
    }

    #[test]
    fn test_reopen_with_other_algorithm_rejected() {
        let dir = tempfile::tempdir().unwrap();
        drop(open_in(dir.path()));

        let config = EngineConfig {
            hash_algorithm: HashAlgorithm::PHash64,
            ..EngineConfig::default().with_data_dir(dir.path())
        };
        let err = DuplicateEngine::open(config, Arc::new(HashingEmbedder::new(64))).unwrap_err();
        assert!(matches!(err, SleuthError::ConfigError(_)));

        // Same settings still open
        assert!(dir.path().join("manifest.json").exists());
        drop(open_in(dir.path()));
    }

    #[test]
    fn test_stats() {
        let engine = engine(EngineConfig::default());
        let stats = engine.stats();
        assert_eq!(stats.dimension, 64);
        assert_eq!(stats.hash_bits, 64);
        assert_eq!(stats.embedding_provider, "hashing-64");
        assert!(!stats.persistent);
    }

    #[test]
    fn test_registration_wire_format() {
        let json = serde_json::to_value(Registration::Failed {
            reason: "disk full".into(),
        })
        .unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["reason"], "disk full");
        assert_eq!(
            serde_json::to_value(DuplicateKind::NearDuplicate).unwrap(),
            "NEAR_DUPLICATE"
        );
    }
}
