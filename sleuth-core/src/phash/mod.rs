//! Perceptual image fingerprints.
//!
//! A [`PerceptualHash`] is a fixed-length bit string that stays close (in
//! Hamming distance) for visually similar images, so a re-encoded or lightly
//! edited copy of an earlier upload still lands near the original.
//!
//! The [`ImageHasher`] trait is what the duplicate engine and scan pipeline
//! depend on. The concrete [`PerceptualHasher`] needs the `perceptual-hash`
//! feature.

#[cfg(feature = "perceptual-hash")]
mod hasher;

#[cfg(feature = "perceptual-hash")]
pub use hasher::PerceptualHasher;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SleuthError};

/// Default fingerprint length in bits.
pub const DEFAULT_HASH_BITS: u32 = 64;

/// Perceptual hash algorithm selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// Grid-based blockhash, 64 bits
    #[default]
    Blockhash64,
    /// DCT mean hash over an 8x8 grid, 64 bits
    #[serde(rename = "phash")]
    PHash64,
}

impl HashAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blockhash64 => "blockhash64",
            Self::PHash64 => "phash",
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HashAlgorithm {
    type Err = SleuthError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "blockhash" | "blockhash64" => Ok(Self::Blockhash64),
            "phash" | "phash64" | "dct" => Ok(Self::PHash64),
            other => Err(SleuthError::PerceptualHashError(format!(
                "unknown hash algorithm '{other}'"
            ))),
        }
    }
}

/// Computed perceptual hash with metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerceptualHash {
    /// Hash bytes, most significant bit first
    pub hash: Vec<u8>,
    /// Algorithm used to compute the hash
    pub algorithm: HashAlgorithm,
    /// Hash size in bits
    pub bit_size: u32,
}

impl PerceptualHash {
    pub fn from_bytes(hash: Vec<u8>, algorithm: HashAlgorithm) -> Self {
        let bit_size = (hash.len() * 8) as u32;
        Self {
            hash,
            algorithm,
            bit_size,
        }
    }

    /// Number of bits in the fingerprint.
    pub fn bit_len(&self) -> u32 {
        self.bit_size
    }

    /// Hamming distance to another hash of the same length.
    pub fn hamming_distance(&self, other: &Self) -> Result<u32> {
        hamming_distance(&self.hash, &other.hash).ok_or(SleuthError::HashLengthMismatch {
            expected: self.bit_len(),
            actual: other.bit_len(),
        })
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.hash)
    }

    /// Parse a hex fingerprint. Empty input is rejected.
    pub fn from_hex(hex_str: &str, algorithm: HashAlgorithm) -> Result<Self> {
        let hash = hex::decode(hex_str.trim())
            .map_err(|e| SleuthError::PerceptualHashError(format!("Invalid hex string: {e}")))?;
        if hash.is_empty() {
            return Err(SleuthError::PerceptualHashError("Empty hash".into()));
        }
        Ok(Self::from_bytes(hash, algorithm))
    }
}

impl fmt::Display for PerceptualHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.to_hex())
    }
}

/// Bitwise Hamming distance between two equal-length byte strings.
///
/// Returns `None` if the lengths differ or either input is empty; fingerprints
/// of different lengths are not comparable.
pub fn hamming_distance(hash1: &[u8], hash2: &[u8]) -> Option<u32> {
    if hash1.is_empty() || hash1.len() != hash2.len() {
        return None;
    }

    Some(
        hash1
            .iter()
            .zip(hash2.iter())
            .map(|(a, b)| (a ^ b).count_ones())
            .sum(),
    )
}

/// Maps image bytes to a perceptual fingerprint.
pub trait ImageHasher: Send + Sync {
    /// Hash an encoded image (JPEG, PNG, GIF, WebP, ...).
    fn hash_bytes(&self, image_data: &[u8]) -> Result<PerceptualHash>;

    /// Whether the bytes look like an image this hasher can decode.
    fn supports(&self, data: &[u8]) -> bool;

    /// Length of every hash this hasher produces.
    fn bit_len(&self) -> u32;

    /// Algorithm behind every hash this hasher produces.
    fn algorithm(&self) -> HashAlgorithm;
}
