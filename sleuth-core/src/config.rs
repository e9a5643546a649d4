//! Engine configuration.

use std::path::PathBuf;

use crate::error::{Result, SleuthError};
use crate::phash::{HashAlgorithm, DEFAULT_HASH_BITS};

/// Default cosine threshold for a textual near-duplicate.
pub const DEFAULT_DUPLICATE_THRESHOLD: f32 = 0.90;

/// File name of the embedding log inside the data directory.
pub const VECTORS_LOG: &str = "vectors.log";

/// File name of the hash log inside the data directory.
pub const HASHES_LOG: &str = "hashes.log";

/// File name of the store manifest inside the data directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Duplicate engine configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Directory holding the record logs; `None` keeps everything in memory
    pub data_dir: Option<PathBuf>,
    /// Minimum cosine score for a textual near-duplicate
    pub duplicate_threshold: f32,
    /// Maximum Hamming distance for an image near-duplicate (0 = exact only)
    pub near_hash_distance: u32,
    /// Perceptual hash length for this deployment
    pub hash_bits: u32,
    /// Algorithm every stored image hash was computed with
    pub hash_algorithm: HashAlgorithm,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            duplicate_threshold: DEFAULT_DUPLICATE_THRESHOLD,
            near_hash_distance: 0,
            hash_bits: DEFAULT_HASH_BITS,
            hash_algorithm: HashAlgorithm::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables.
    ///
    /// - `SLEUTH_DATA_DIR`: data directory (default: in-memory)
    /// - `SLEUTH_DUPLICATE_THRESHOLD`: cosine threshold (default: 0.90)
    /// - `SLEUTH_NEAR_HASH_DISTANCE`: Hamming bound (default: 0)
    /// - `SLEUTH_HASH_BITS`: hash length (default: 64)
    /// - `SLEUTH_HASH_ALGORITHM`: `blockhash` or `phash` (default: blockhash)
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let config = Self {
            data_dir: std::env::var("SLEUTH_DATA_DIR")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
            duplicate_threshold: parse_env(
                "SLEUTH_DUPLICATE_THRESHOLD",
                defaults.duplicate_threshold,
            )?,
            near_hash_distance: parse_env(
                "SLEUTH_NEAR_HASH_DISTANCE",
                defaults.near_hash_distance,
            )?,
            hash_bits: parse_env("SLEUTH_HASH_BITS", defaults.hash_bits)?,
            hash_algorithm: parse_env("SLEUTH_HASH_ALGORITHM", defaults.hash_algorithm)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Use `dir` for persistence.
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.duplicate_threshold.is_finite()
            || self.duplicate_threshold <= 0.0
            || self.duplicate_threshold > 1.0
        {
            return Err(SleuthError::ConfigError(format!(
                "duplicate threshold must be in (0, 1], got {}",
                self.duplicate_threshold
            )));
        }
        if self.hash_bits == 0 || self.hash_bits % 8 != 0 {
            return Err(SleuthError::ConfigError(format!(
                "hash length must be a positive multiple of 8 bits, got {}",
                self.hash_bits
            )));
        }
        if self.near_hash_distance >= self.hash_bits {
            return Err(SleuthError::ConfigError(format!(
                "near hash distance {} must be below the hash length {}",
                self.near_hash_distance, self.hash_bits
            )));
        }
        Ok(())
    }

    pub fn vectors_path(&self) -> Option<PathBuf> {
        self.data_dir.as_ref().map(|d| d.join(VECTORS_LOG))
    }

    pub fn hashes_path(&self) -> Option<PathBuf> {
        self.data_dir.as_ref().map(|d| d.join(HASHES_LOG))
    }

    pub fn manifest_path(&self) -> Option<PathBuf> {
        self.data_dir.as_ref().map(|d| d.join(MANIFEST_FILE))
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| SleuthError::ConfigError(format!("{name} has invalid value '{raw}'"))),
        Err(_) => Ok(default),
    }
}
