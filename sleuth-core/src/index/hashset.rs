//! Persisted set of perceptual hashes.

use std::collections::HashMap;
use std::path::Path;

use parking_lot::{RwLock, RwLockWriteGuard};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{CheckedInsert, RecordLog};
use crate::error::{Result, SleuthError};
use crate::phash::{hamming_distance, PerceptualHash};

/// A stored hash and the first submission that carried it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashRecord {
    pub hash: Vec<u8>,
    pub submission_id: String,
}

/// Closest stored hash for a query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashMatch {
    pub submission_id: String,
    pub distance: u32,
}

impl HashMatch {
    pub fn is_exact(&self) -> bool {
        self.distance == 0
    }
}

struct HashSetInner {
    records: Vec<HashRecord>,
    positions: HashMap<Vec<u8>, usize>,
    log: RecordLog<HashRecord>,
}

impl HashSetInner {
    fn exact(&self, hash: &[u8]) -> Option<HashMatch> {
        self.positions.get(hash).map(|&i| HashMatch {
            submission_id: self.records[i].submission_id.clone(),
            distance: 0,
        })
    }

    /// Closest record within `max_distance`; ties keep the earliest.
    fn nearest(&self, hash: &[u8], max_distance: u32) -> Option<HashMatch> {
        if let Some(found) = self.exact(hash) {
            return Some(found);
        }
        if max_distance == 0 {
            return None;
        }

        let mut best: Option<(u32, usize)> = None;
        for (i, record) in self.records.iter().enumerate() {
            let Some(distance) = hamming_distance(hash, &record.hash) else {
                continue;
            };
            if distance <= max_distance && best.map_or(true, |(d, _)| distance < d) {
                best = Some((distance, i));
            }
        }

        best.map(|(distance, i)| HashMatch {
            submission_id: self.records[i].submission_id.clone(),
            distance,
        })
    }

    fn append(&mut self, hash: &[u8], submission_id: &str) -> Result<()> {
        let record = HashRecord {
            hash: hash.to_vec(),
            submission_id: submission_id.to_string(),
        };
        self.log.append(&record)?;
        self.positions.insert(record.hash.clone(), self.records.len());
        self.records.push(record);
        Ok(())
    }
}

/// Exclusive access to the set for one registration.
pub(crate) struct HashSetWriter<'a> {
    inner: RwLockWriteGuard<'a, HashSetInner>,
    undo: Option<u64>,
}

impl HashSetWriter<'_> {
    pub(crate) fn nearest(&self, hash: &PerceptualHash, max_distance: u32) -> Option<HashMatch> {
        self.inner.nearest(&hash.hash, max_distance)
    }

    pub(crate) fn append(&mut self, hash: &PerceptualHash, submission_id: &str) -> Result<()> {
        let before = self.inner.log.len_bytes();
        self.inner.append(&hash.hash, submission_id)?;
        self.undo = Some(before);
        Ok(())
    }

    /// Remove the record added by the last [`HashSetWriter::append`].
    pub(crate) fn rollback_last(&mut self) -> Result<()> {
        let Some(before) = self.undo.take() else {
            return Ok(());
        };
        self.inner.log.truncate(before)?;
        if let Some(record) = self.inner.records.pop() {
            self.inner.positions.remove(&record.hash);
            debug!(submission_id = %record.submission_id, "Hash append rolled back");
        }
        Ok(())
    }
}

/// Exact and near-exact membership over fixed-length perceptual hashes.
///
/// Every hash in the set has the same bit length; queries with any other
/// length fail with [`SleuthError::HashLengthMismatch`].
pub struct PerceptualHashSet {
    hash_bits: u32,
    inner: RwLock<HashSetInner>,
}

impl PerceptualHashSet {
    /// Open the set, replaying the log at `path` if one is given.
    pub fn open(hash_bits: u32, path: Option<&Path>) -> Result<Self> {
        if hash_bits == 0 || hash_bits % 8 != 0 {
            return Err(SleuthError::ConfigError(format!(
                "hash length must be a positive multiple of 8 bits, got {hash_bits}"
            )));
        }

        let (log, persisted) = match path {
            Some(path) => RecordLog::<HashRecord>::open(path)?,
            None => (RecordLog::ephemeral(), Vec::new()),
        };

        let mut records = Vec::with_capacity(persisted.len());
        let mut positions = HashMap::with_capacity(persisted.len());
        for record in persisted {
            let actual = (record.hash.len() * 8) as u32;
            if actual != hash_bits {
                return Err(SleuthError::HashLengthMismatch {
                    expected: hash_bits,
                    actual,
                });
            }
            if positions.contains_key(&record.hash) {
                warn!(submission_id = %record.submission_id, "Skipping repeated hash record");
                continue;
            }
            positions.insert(record.hash.clone(), records.len());
            records.push(record);
        }

        Ok(Self {
            hash_bits,
            inner: RwLock::new(HashSetInner {
                records,
                positions,
                log,
            }),
        })
    }

    /// In-memory set with nothing persisted.
    pub fn ephemeral(hash_bits: u32) -> Result<Self> {
        Self::open(hash_bits, None)
    }

    pub fn hash_bits(&self) -> u32 {
        self.hash_bits
    }

    pub fn len(&self) -> usize {
        self.inner.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reject hashes whose length differs from the set's.
    pub fn check_length(&self, hash: &PerceptualHash) -> Result<()> {
        let actual = (hash.hash.len() * 8) as u32;
        if actual != self.hash_bits {
            return Err(SleuthError::HashLengthMismatch {
                expected: self.hash_bits,
                actual,
            });
        }
        Ok(())
    }

    pub fn contains_exact(&self, hash: &PerceptualHash) -> Result<bool> {
        self.check_length(hash)?;
        Ok(self.inner.read().positions.contains_key(&hash.hash))
    }

    /// Whether any stored hash is within `max_distance` bits.
    pub fn contains_near(&self, hash: &PerceptualHash, max_distance: u32) -> Result<bool> {
        Ok(self.find_near(hash, max_distance)?.is_some())
    }

    /// Closest stored hash within `max_distance` bits, if any.
    pub fn find_near(&self, hash: &PerceptualHash, max_distance: u32) -> Result<Option<HashMatch>> {
        self.check_length(hash)?;
        Ok(self.inner.read().nearest(&hash.hash, max_distance))
    }

    /// Insert a hash. Returns `false` if it was already present.
    pub fn insert(&self, hash: &PerceptualHash, submission_id: &str) -> Result<bool> {
        self.check_length(hash)?;
        let mut inner = self.inner.write();
        if inner.positions.contains_key(&hash.hash) {
            return Ok(false);
        }
        inner.append(&hash.hash, submission_id)?;
        Ok(true)
    }

    /// Look up the closest hash within `max_distance`, then insert unless an
    /// identical hash is already stored, under one write lock.
    ///
    /// `commit` is `Ok(true)` for a new record and `Ok(false)` when the hash
    /// was already present.
    pub fn check_and_insert(
        &self,
        hash: &PerceptualHash,
        submission_id: &str,
        max_distance: u32,
    ) -> Result<CheckedInsert<Option<HashMatch>, bool>> {
        self.check_length(hash)?;

        let mut writer = self.writer();
        let prior = writer.nearest(hash, max_distance);
        let commit = match &prior {
            Some(found) if found.is_exact() => Ok(false),
            _ => writer.append(hash, submission_id).map(|()| true),
        };
        drop(writer);

        debug!(
            submission_id,
            prior = ?prior.as_ref().map(|m| m.distance),
            "Hash checked"
        );
        Ok(CheckedInsert { prior, commit })
    }

    /// Take the write lock for a multi-step registration. Callers holding
    /// both this and the index writer must take this one first.
    pub(crate) fn writer(&self) -> HashSetWriter<'_> {
        HashSetWriter {
            inner: self.inner.write(),
            undo: None,
        }
    }

    #[cfg(test)]
    pub(crate) fn fail_appends(&self) {
        self.inner.write().log.fail_appends();
    }
}

impl std::fmt::Debug for PerceptualHashSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PerceptualHashSet")
            .field("hash_bits", &self.hash_bits)
            .field("records", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phash::HashAlgorithm;

    fn hash(bytes: [u8; 8]) -> PerceptualHash {
        PerceptualHash::from_bytes(bytes.to_vec(), HashAlgorithm::Blockhash64)
    }

    #[test]
    fn test_insert_is_idempotent() {
        let set = PerceptualHashSet::ephemeral(64).unwrap();
        let h = hash([1, 2, 3, 4, 5, 6, 7, 8]);

        assert!(set.insert(&h, "first").unwrap());
        assert!(!set.insert(&h, "second").unwrap());
        assert_eq!(set.len(), 1);

        let owner = set.find_near(&h, 0).unwrap().unwrap();
        assert_eq!(owner.submission_id, "first");
        assert!(owner.is_exact());
    }

    #[test]
    fn test_contains_near() {
        let set = PerceptualHashSet::ephemeral(64).unwrap();
        set.insert(&hash([0; 8]), "a").unwrap();

        let three_bits = hash([0b0000_0111, 0, 0, 0, 0, 0, 0, 0]);
        assert!(!set.contains_exact(&three_bits).unwrap());
        assert!(!set.contains_near(&three_bits, 0).unwrap());
        assert!(!set.contains_near(&three_bits, 2).unwrap());
        assert!(set.contains_near(&three_bits, 3).unwrap());

        let found = set.find_near(&three_bits, 10).unwrap().unwrap();
        assert_eq!(found.distance, 3);
    }

    #[test]
    fn test_find_near_picks_closest() {
        let set = PerceptualHashSet::ephemeral(64).unwrap();
        set.insert(&hash([0xFF, 0, 0, 0, 0, 0, 0, 0]), "far").unwrap();
        set.insert(&hash([0x01, 0, 0, 0, 0, 0, 0, 0]), "near").unwrap();

        let found = set.find_near(&hash([0; 8]), 16).unwrap().unwrap();
        assert_eq!(found.submission_id, "near");
        assert_eq!(found.distance, 1);
    }

    #[test]
    fn test_length_mismatch() {
        let set = PerceptualHashSet::ephemeral(64).unwrap();
        let short = PerceptualHash::from_bytes(vec![0; 4], HashAlgorithm::Blockhash64);

        assert!(matches!(
            set.contains_exact(&short),
            Err(SleuthError::HashLengthMismatch {
                expected: 64,
                actual: 32
            })
        ));
        assert!(set.insert(&short, "x").is_err());
        assert!(set.check_and_insert(&short, "x", 0).is_err());
    }

    #[test]
    fn test_invalid_bit_length_config() {
        assert!(PerceptualHashSet::ephemeral(0).is_err());
        assert!(PerceptualHashSet::ephemeral(63).is_err());
    }

    #[test]
    fn test_check_and_insert() {
        let set = PerceptualHashSet::ephemeral(64).unwrap();
        let h = hash([9; 8]);

        let first = set.check_and_insert(&h, "a", 0).unwrap();
        assert!(first.prior.is_none());
        assert!(first.commit.unwrap());

        let second = set.check_and_insert(&h, "b", 0).unwrap();
        assert_eq!(second.prior.unwrap().submission_id, "a");
        assert!(!second.commit.unwrap());
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_near_match_is_still_registered() {
        let set = PerceptualHashSet::ephemeral(64).unwrap();
        set.insert(&hash([0; 8]), "a").unwrap();

        let outcome = set
            .check_and_insert(&hash([1, 0, 0, 0, 0, 0, 0, 0]), "b", 4)
            .unwrap();
        assert_eq!(outcome.prior.unwrap().distance, 1);
        assert!(outcome.commit.unwrap());
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_persistence_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hashes.log");
        {
            let set = PerceptualHashSet::open(64, Some(&path)).unwrap();
            set.insert(&hash([1; 8]), "a").unwrap();
            set.insert(&hash([2; 8]), "b").unwrap();
            set.insert(&hash([1; 8]), "c").unwrap();
        }

        let set = PerceptualHashSet::open(64, Some(&path)).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(
            set.find_near(&hash([2; 8]), 0).unwrap().unwrap().submission_id,
            "b"
        );

        assert!(matches!(
            PerceptualHashSet::open(128, Some(&path)),
            Err(SleuthError::HashLengthMismatch {
                expected: 128,
                actual: 64
            })
        ));
    }

    #[test]
    fn test_failed_commit_leaves_memory_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hashes.log");
        let set = PerceptualHashSet::open(64, Some(&path)).unwrap();

        set.fail_appends();
        let outcome = set.check_and_insert(&hash([7; 8]), "a", 0).unwrap();
        assert!(outcome.prior.is_none());
        assert!(matches!(
            outcome.commit,
            Err(SleuthError::PersistenceFailure(_))
        ));
        assert!(set.is_empty());
        assert!(!set.contains_exact(&hash([7; 8])).unwrap());
    }

    #[test]
    fn test_writer_rollback_forgets_hash() {
        let set = PerceptualHashSet::ephemeral(64).unwrap();
        let h = hash([9; 8]);
        {
            let mut writer = set.writer();
            writer.append(&h, "undone").unwrap();
            writer.rollback_last().unwrap();
        }
        assert!(set.is_empty());
        assert!(!set.contains_exact(&h).unwrap());
        assert!(set.insert(&h, "later").unwrap());
    }
}
