//! Sleuth Core - duplicate detection and fraud-signal aggregation
//!
//! This crate decides, for each uploaded document or image, how likely it is
//! to be fraudulent. It combines independent forensic signals into one
//! fraud score and severity band.
//!
//! # Components
//!
//! - [`DuplicateEngine`]: "have we seen this before?" over a persisted text
//!   embedding index and a persisted perceptual-hash set
//! - [`SignalAggregator`]: weighted, clamped fraud score and severity
//! - [`forensics`]: PII, PDF metadata and tamper collaborators
//! - [`ScanPipeline`]: runs all of the above for one submission
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use sleuth_core::{
//!     DuplicateEngine, EngineConfig, HashingEmbedder, ScanPipeline, Submission,
//! };
//!
//! # async fn example() -> sleuth_core::Result<()> {
//! let config = EngineConfig::default().with_data_dir("/var/lib/sleuth");
//! let engine = DuplicateEngine::open(config, Arc::new(HashingEmbedder::default()))?;
//! let pipeline = ScanPipeline::builder(Arc::new(engine)).build()?;
//!
//! let report = pipeline
//!     .scan(Submission::new(b"Invoice #12345, amount 500".to_vec()))
//!     .await;
//! println!("{} ({})", report.verdict.fraud_score, report.verdict.severity);
//! # Ok(())
//! # }
//! ```

pub mod aggregate;
pub mod config;
pub mod duplicate;
pub mod embedding;
pub mod error;
pub mod finding;
pub mod forensics;
pub mod index;
pub mod phash;
pub mod pipeline;

pub use aggregate::{ScanVerdict, ScoreWeights, Severity, SignalAggregator};
pub use config::EngineConfig;
pub use duplicate::{DuplicateEngine, DuplicateKind, DuplicateVerdict, EngineStats, Registration};
pub use embedding::{
    EmbeddingProvider, EmbeddingProviderConfig, EmbeddingProviderFactory, HashingEmbedder,
};
pub use error::{Result, SleuthError};
pub use finding::{Finding, FindingKind};
pub use index::{PerceptualHashSet, SimilarityIndex, StoreManifest};
pub use phash::{hamming_distance, HashAlgorithm, ImageHasher, PerceptualHash};
pub use pipeline::{ScanPipeline, ScanReport, SignalReport, SignalStatus, Submission};

#[cfg(feature = "network")]
pub use embedding::{HttpEmbeddingConfig, HttpEmbeddingProvider};

#[cfg(feature = "perceptual-hash")]
pub use phash::PerceptualHasher;
