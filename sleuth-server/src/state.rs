//! Application state module
//!
//! Defines shared state accessible across all request handlers.

use std::sync::Arc;

use sleuth_core::{
    DuplicateEngine, EmbeddingProviderConfig, EmbeddingProviderFactory, HashingEmbedder,
    ImageHasher, PerceptualHasher, ScanPipeline, SignalAggregator,
};

use crate::config::Config;

/// Application state containing shared resources.
#[derive(Clone)]
pub struct AppState {
    /// Collaborators, duplicate engine and aggregator
    pub pipeline: Arc<ScanPipeline>,
    /// Maximum accepted upload size in bytes
    pub max_file_size: usize,
}

impl AppState {
    pub fn new(pipeline: ScanPipeline, max_file_size: usize) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            max_file_size,
        }
    }

    /// Open the persisted engine and build the pipeline described by `config`.
    pub fn from_config(config: &Config) -> sleuth_core::Result<Self> {
        let embedder = EmbeddingProviderFactory::create(EmbeddingProviderConfig::Auto)?;
        let engine = DuplicateEngine::open(config.engine.clone(), embedder)?;
        Self::with_engine(engine, config)
    }

    /// In-memory state with the hashing embedder, for tests and local runs.
    pub fn ephemeral(config: &Config) -> sleuth_core::Result<Self> {
        let embedder = Arc::new(HashingEmbedder::default());
        let engine = DuplicateEngine::ephemeral(config.engine.clone(), embedder)?;
        Self::with_engine(engine, config)
    }

    fn with_engine(engine: DuplicateEngine, config: &Config) -> sleuth_core::Result<Self> {
        let hasher = PerceptualHasher::new(config.engine.hash_algorithm);
        let pipeline = ScanPipeline::builder(Arc::new(engine))
            .with_image_hasher(Arc::new(hasher))
            .with_aggregator(SignalAggregator::new(config.weights))
            .build()?;
        Ok(Self::new(pipeline, config.max_file_size()))
    }

    pub fn engine(&self) -> &DuplicateEngine {
        self.pipeline.engine()
    }

    pub fn aggregator(&self) -> &SignalAggregator {
        self.pipeline.aggregator()
    }

    pub fn image_hasher(&self) -> Option<&Arc<dyn ImageHasher>> {
        self.pipeline.image_hasher()
    }
}

#[cfg(test)]
mod tests {
    use sleuth_core::{EngineConfig, HashAlgorithm, ScoreWeights, SleuthError};

    use super::*;

    #[test]
    fn test_ephemeral_uses_configured_weights() {
        let config = Config {
            weights: ScoreWeights {
                pii: 55.0,
                ..ScoreWeights::default()
            },
            ..Config::default()
        };
        let state = AppState::ephemeral(&config).unwrap();
        assert_eq!(state.aggregator().weights().pii, 55.0);
    }

    #[test]
    fn test_hasher_follows_engine_algorithm() {
        let config = Config {
            engine: EngineConfig {
                hash_algorithm: HashAlgorithm::PHash64,
                ..EngineConfig::default()
            },
            ..Config::default()
        };
        let state = AppState::ephemeral(&config).unwrap();
        assert_eq!(
            state.image_hasher().map(|h| h.algorithm()),
            Some(HashAlgorithm::PHash64)
        );
    }

    #[test]
    fn test_unsupported_hash_length_rejected() {
        let config = Config {
            engine: EngineConfig {
                hash_bits: 128,
                ..EngineConfig::default()
            },
            ..Config::default()
        };
        assert!(matches!(
            AppState::ephemeral(&config),
            Err(SleuthError::HashLengthMismatch { expected: 128, .. })
        ));
    }
}
