//! Settings a data directory was written with.
//!
//! The record logs only hold vectors and hash bytes. Reopening them under a
//! different embedding model or hash algorithm would compare values from
//! two incompatible spaces, so the first open records its settings in
//! `manifest.json` and every later open must match them.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Result, SleuthError};
use crate::phash::HashAlgorithm;

/// Embedding and hashing settings persisted next to the record logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreManifest {
    /// [`crate::EmbeddingProvider::provider_id`] of the embedder
    pub embedding_provider: String,
    pub dimension: usize,
    pub hash_algorithm: HashAlgorithm,
    pub hash_bits: u32,
}

impl StoreManifest {
    /// Read the manifest at `path`; `None` if the file does not exist.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(SleuthError::PersistenceFailure(format!(
                    "cannot read {}: {e}",
                    path.display()
                )))
            }
        };
        serde_json::from_slice(&bytes).map(Some).map_err(|e| {
            SleuthError::SerializationError(format!("invalid manifest {}: {e}", path.display()))
        })
    }

    /// Write the manifest atomically: temp file, fsync, rename.
    pub fn store(&self, path: &Path) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(self)
            .map_err(|e| SleuthError::SerializationError(e.to_string()))?;
        let persist_err = |e: std::io::Error| {
            SleuthError::PersistenceFailure(format!("cannot write {}: {e}", path.display()))
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(persist_err)?;
        }
        let tmp_path = path.with_extension("json.tmp");
        let mut file = File::create(&tmp_path).map_err(persist_err)?;
        file.write_all(&bytes).map_err(persist_err)?;
        file.sync_all().map_err(persist_err)?;
        if let Err(e) = fs::rename(&tmp_path, path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(persist_err(e));
        }

        info!(
            path = %path.display(),
            provider = %self.embedding_provider,
            "Store manifest written"
        );
        Ok(())
    }

    /// Fail with [`SleuthError::ConfigError`] naming every setting that
    /// differs from what the store was written with.
    pub fn ensure_matches(&self, current: &StoreManifest) -> Result<()> {
        let mut diffs = Vec::new();
        if self.embedding_provider != current.embedding_provider {
            diffs.push(format!(
                "embedding provider {} (stored {})",
                current.embedding_provider, self.embedding_provider
            ));
        }
        if self.dimension != current.dimension {
            diffs.push(format!(
                "dimension {} (stored {})",
                current.dimension, self.dimension
            ));
        }
        if self.hash_algorithm != current.hash_algorithm {
            diffs.push(format!(
                "hash algorithm {} (stored {})",
                current.hash_algorithm, self.hash_algorithm
            ));
        }
        if self.hash_bits != current.hash_bits {
            diffs.push(format!(
                "hash length {} bits (stored {})",
                current.hash_bits, self.hash_bits
            ));
        }

        if diffs.is_empty() {
            return Ok(());
        }
        Err(SleuthError::ConfigError(format!(
            "data directory was written with different settings: {}",
            diffs.join(", ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest() -> StoreManifest {
        StoreManifest {
            embedding_provider: "hashing-384".into(),
            dimension: 384,
            hash_algorithm: HashAlgorithm::Blockhash64,
            hash_bits: 64,
        }
    }

    #[test]
    fn test_missing_manifest_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(StoreManifest::load(&dir.path().join("manifest.json"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_store_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("manifest.json");
        manifest().store(&path).unwrap();

        assert_eq!(StoreManifest::load(&path).unwrap(), Some(manifest()));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_mismatch_names_every_difference() {
        let current = StoreManifest {
            embedding_provider: "http:all-MiniLM-L6-v2".into(),
            hash_algorithm: HashAlgorithm::PHash64,
            ..manifest()
        };
        let err = manifest().ensure_matches(&current).unwrap_err();
        let message = err.to_string();
        assert!(matches!(err, SleuthError::ConfigError(_)));
        assert!(message.contains("http:all-MiniLM-L6-v2"));
        assert!(message.contains("phash"));
        assert!(!message.contains("dimension"));

        assert!(manifest().ensure_matches(&manifest()).is_ok());
    }

    #[test]
    fn test_corrupt_manifest_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.json");
        fs::write(&path, b"{not json").unwrap();
        assert!(matches!(
            StoreManifest::load(&path),
            Err(SleuthError::SerializationError(_))
        ));
    }
}
