//! Embedding provider selection.

use std::sync::Arc;

use super::{EmbeddingProvider, HashingEmbedder, DEFAULT_EMBEDDING_DIMENSION};
use crate::error::Result;

#[cfg(feature = "network")]
use super::{HttpEmbeddingConfig, HttpEmbeddingProvider};

/// Configuration for creating embedding providers.
#[derive(Debug, Clone, Default)]
pub enum EmbeddingProviderConfig {
    /// Deterministic hashing embedder (no model, testing and offline use)
    Hashing { dimension: usize },

    /// Remote OpenAI-compatible endpoint
    #[cfg(feature = "network")]
    Http(HttpEmbeddingConfig),

    /// HTTP if `SLEUTH_EMBEDDING_URL` is set, hashing otherwise
    #[default]
    Auto,
}

/// Factory for creating embedding providers.
pub struct EmbeddingProviderFactory;

impl EmbeddingProviderFactory {
    /// Create an embedding provider from configuration.
    pub fn create(config: EmbeddingProviderConfig) -> Result<Arc<dyn EmbeddingProvider>> {
        match config {
            EmbeddingProviderConfig::Hashing { dimension } => {
                Ok(Arc::new(HashingEmbedder::new(dimension)))
            }
            #[cfg(feature = "network")]
            EmbeddingProviderConfig::Http(http_config) => {
                let provider = HttpEmbeddingProvider::new(http_config)?;
                Ok(Arc::new(provider))
            }
            EmbeddingProviderConfig::Auto => Self::create_auto(),
        }
    }

    /// Auto-select a provider.
    ///
    /// Priority:
    /// 1. HTTP endpoint (if `SLEUTH_EMBEDDING_URL` is set)
    /// 2. Hashing embedder at the default dimension
    fn create_auto() -> Result<Arc<dyn EmbeddingProvider>> {
        #[cfg(feature = "network")]
        if let Ok(http_config) = HttpEmbeddingConfig::from_env() {
            tracing::info!(model = %http_config.model, "Auto-selected HTTP embedding provider");
            return Self::create(EmbeddingProviderConfig::Http(http_config));
        }

        tracing::info!(
            dimension = DEFAULT_EMBEDDING_DIMENSION,
            "Auto-selected hashing embedding provider"
        );
        Ok(Self::create_hashing(DEFAULT_EMBEDDING_DIMENSION))
    }

    /// Create a hashing provider for testing.
    pub fn create_hashing(dimension: usize) -> Arc<dyn EmbeddingProvider> {
        Arc::new(HashingEmbedder::new(dimension))
    }
}
