//! Deterministic feature-hashing embedder.

use async_trait::async_trait;
use sha3::{Digest, Sha3_256};

use super::EmbeddingProvider;
use crate::error::Result;

/// Default dimension, matching the MiniLM sentence-transformer family.
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 384;

/// Bag-of-words embedder using the signed hashing trick.
///
/// Each lowercase alphanumeric token is hashed with SHA3-256; the first eight
/// bytes choose a bucket and the top bit a sign. Identical texts always map to
/// identical vectors, and texts that share most of their tokens land close
/// together. Word order is ignored.
///
/// This is the default provider when no model endpoint is configured, and
/// the stub used throughout the test suite.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    /// Embed synchronously. The result is not normalized.
    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];

        for token in tokenize(text) {
            let digest = Sha3_256::digest(token.as_bytes());
            let mut head = [0u8; 8];
            head.copy_from_slice(&digest[..8]);
            let h = u64::from_le_bytes(head);

            let bucket = (h % self.dimension as u64) as usize;
            let sign = if h >> 63 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        vector
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_EMBEDDING_DIMENSION)
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn provider_id(&self) -> String {
        format!("hashing-{}", self.dimension)
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{dot, is_zero, normalize};

    #[test]
    fn test_hashing_embedder_deterministic() {
        let embedder1 = HashingEmbedder::new(64);
        let embedder2 = HashingEmbedder::new(64);

        let v1 = embedder1.embed_sync("Invoice #12345, amount 500");
        let v2 = embedder2.embed_sync("Invoice #12345, amount 500");

        assert_eq!(v1, v2, "Same text should produce same vector");
        assert_eq!(v1.len(), 64);
    }

    #[test]
    fn test_case_and_punctuation_insensitive() {
        let embedder = HashingEmbedder::default();
        let a = normalize(&embedder.embed_sync("Invoice #12345, amount 500"));
        let b = normalize(&embedder.embed_sync("invoice 12345 AMOUNT 500"));
        assert!((dot(&a, &b) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_different_texts_less_similar() {
        let embedder = HashingEmbedder::default();
        let a = normalize(&embedder.embed_sync("Invoice #12345, amount 500"));
        let b = normalize(&embedder.embed_sync("Bank statement for March, balance 9000"));
        assert!(dot(&a, &b) < 0.9);
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let embedder = HashingEmbedder::new(16);
        assert!(is_zero(&embedder.embed_sync("  ,;  ")));
    }

    #[tokio::test]
    async fn test_provider_trait() {
        let embedder = HashingEmbedder::new(32);
        let v = embedder.embed("hello world").await.unwrap();
        assert_eq!(v.len(), embedder.dimension());
        assert_eq!(embedder.provider_id(), "hashing-32");
    }
}
