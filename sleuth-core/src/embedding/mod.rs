//! Text embedding providers.
//!
//! The duplicate engine never talks to a model directly: it receives an
//! [`EmbeddingProvider`] at construction time and only ever asks it for a
//! fixed-dimension vector.
//!
//! ## Providers
//!
//! - **Hashing** - deterministic feature-hashing embedder, no model needed
//! - **HTTP** - OpenAI-compatible `/embeddings` endpoint with retry
//!
//! ## Quick Start
//!
//! ```no_run
//! use sleuth_core::embedding::{EmbeddingProviderConfig, EmbeddingProviderFactory};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = EmbeddingProviderFactory::create(EmbeddingProviderConfig::Auto)?;
//! let vector = provider.embed("Invoice #12345, amount 500").await?;
//! assert_eq!(vector.len(), provider.dimension());
//! # Ok(())
//! # }
//! ```

mod hashing;
#[cfg(feature = "network")]
mod http_client;
mod provider;

pub use hashing::{HashingEmbedder, DEFAULT_EMBEDDING_DIMENSION};
#[cfg(feature = "network")]
pub use http_client::{HttpEmbeddingConfig, HttpEmbeddingProvider};
pub use provider::{EmbeddingProviderConfig, EmbeddingProviderFactory};

use async_trait::async_trait;

use crate::error::Result;

/// Maps text to a fixed-dimension real vector.
///
/// Implementations must be deterministic for identical input and must be
/// thread-safe (`Send + Sync`). Retry policy, if any, lives inside the
/// implementation.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text. The returned vector need not be normalized.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Dimension D of every vector this provider returns.
    fn dimension(&self) -> usize;

    /// Identifier for logs and stats (e.g. `"hashing-384"`).
    fn provider_id(&self) -> String;
}

/// Scale a vector to unit L2 length.
///
/// A zero (or non-finite) vector has no direction; it is returned as all
/// zeros so that it scores 0 against everything instead of dividing by zero.
pub fn normalize(vector: &[f32]) -> Vec<f32> {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 || !norm.is_finite() {
        return vec![0.0; vector.len()];
    }
    vector.iter().map(|x| x / norm).collect()
}

/// Inner product of two equal-length vectors.
///
/// Equals cosine similarity when both inputs are normalized.
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Whether every component is zero.
pub fn is_zero(vector: &[f32]) -> bool {
    vector.iter().all(|x| *x == 0.0)
}
