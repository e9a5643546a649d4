//! Cosine-similarity index over text embeddings.

use std::cmp::Ordering;
use std::path::Path;

use parking_lot::{RwLock, RwLockWriteGuard};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::{CheckedInsert, RecordLog};
use crate::embedding::{dot, is_zero, normalize};
use crate::error::{Result, SleuthError};

/// One stored embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub seq: u64,
    pub submission_id: String,
    /// Unit-length (or all-zero) vector
    pub vector: Vec<f32>,
}

/// Best match for a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub score: f32,
    pub submission_id: Option<String>,
}

impl SearchHit {
    fn none() -> Self {
        Self {
            score: 0.0,
            submission_id: None,
        }
    }
}

/// One row of a top-k result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMatch {
    pub score: f32,
    pub submission_id: String,
    pub seq: u64,
}

struct IndexInner {
    entries: Vec<IndexEntry>,
    log: RecordLog<IndexEntry>,
}

impl IndexInner {
    fn next_seq(&self) -> u64 {
        self.entries.last().map(|e| e.seq + 1).unwrap_or(0)
    }

    /// Highest-scoring entry; ties keep the earliest.
    fn best_match(&self, query: &[f32]) -> SearchHit {
        if is_zero(query) {
            return SearchHit::none();
        }

        let mut best: Option<(f32, &IndexEntry)> = None;
        for entry in &self.entries {
            let score = dot(query, &entry.vector);
            if best.map_or(true, |(top, _)| score > top) {
                best = Some((score, entry));
            }
        }

        match best {
            Some((score, entry)) => SearchHit {
                score,
                submission_id: Some(entry.submission_id.clone()),
            },
            None => SearchHit::none(),
        }
    }

    fn append(&mut self, vector: Vec<f32>, submission_id: &str) -> Result<u64> {
        let entry = IndexEntry {
            seq: self.next_seq(),
            submission_id: submission_id.to_string(),
            vector,
        };
        self.log.append(&entry)?;
        let seq = entry.seq;
        self.entries.push(entry);
        Ok(seq)
    }
}

/// Exclusive access to the index for one registration.
///
/// Remembers the log position before its last append so that append can be
/// undone while the lock is still held.
pub(crate) struct IndexWriter<'a> {
    inner: RwLockWriteGuard<'a, IndexInner>,
    undo: Option<u64>,
}

impl IndexWriter<'_> {
    /// Best match for an already normalized query.
    pub(crate) fn best_match(&self, normalized: &[f32]) -> SearchHit {
        self.inner.best_match(normalized)
    }

    pub(crate) fn append(&mut self, normalized: Vec<f32>, submission_id: &str) -> Result<u64> {
        let before = self.inner.log.len_bytes();
        let seq = self.inner.append(normalized, submission_id)?;
        self.undo = Some(before);
        Ok(seq)
    }

    /// Remove the entry added by the last [`IndexWriter::append`], on disk
    /// first and then in memory.
    pub(crate) fn rollback_last(&mut self) -> Result<()> {
        let Some(before) = self.undo.take() else {
            return Ok(());
        };
        self.inner.log.truncate(before)?;
        if let Some(entry) = self.inner.entries.pop() {
            debug!(seq = entry.seq, "Embedding append rolled back");
        }
        Ok(())
    }
}

/// Brute-force nearest-neighbour index, O(n·D) per query.
///
/// Vectors are normalized on the way in, so the inner product is cosine
/// similarity. Entries are never removed or changed.
pub struct SimilarityIndex {
    dimension: usize,
    inner: RwLock<IndexInner>,
}

impl SimilarityIndex {
    /// Open the index, replaying the log at `path` if one is given.
    ///
    /// Fails if any persisted vector has a dimension other than `dimension`.
    pub fn open(dimension: usize, path: Option<&Path>) -> Result<Self> {
        if dimension == 0 {
            return Err(SleuthError::ConfigError(
                "index dimension must be positive".into(),
            ));
        }

        let (log, entries) = match path {
            Some(path) => RecordLog::<IndexEntry>::open(path)?,
            None => (RecordLog::ephemeral(), Vec::new()),
        };

        if let Some(bad) = entries.iter().find(|e| e.vector.len() != dimension) {
            return Err(SleuthError::DimensionMismatch {
                expected: dimension,
                actual: bad.vector.len(),
            });
        }

        Ok(Self {
            dimension,
            inner: RwLock::new(IndexInner { entries, log }),
        })
    }

    /// In-memory index with nothing persisted.
    pub fn ephemeral(dimension: usize) -> Result<Self> {
        Self::open(dimension, None)
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check the dimension and normalize.
    pub(crate) fn prepare(&self, vector: &[f32]) -> Result<Vec<f32>> {
        if vector.len() != self.dimension {
            return Err(SleuthError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        Ok(normalize(vector))
    }

    /// Best cosine score and its submission.
    ///
    /// Returns `(0.0, None)` for an empty index or an all-zero query.
    pub fn search(&self, vector: &[f32]) -> Result<SearchHit> {
        let query = self.prepare(vector)?;
        Ok(self.inner.read().best_match(&query))
    }

    /// The `k` best matches, best first; equal scores are ordered by
    /// insertion.
    pub fn search_top_k(&self, vector: &[f32], k: usize) -> Result<Vec<IndexMatch>> {
        let query = self.prepare(vector)?;
        if k == 0 {
            return Ok(Vec::new());
        }

        let inner = self.inner.read();
        let mut matches: Vec<IndexMatch> = inner
            .entries
            .iter()
            .map(|entry| IndexMatch {
                score: dot(&query, &entry.vector),
                submission_id: entry.submission_id.clone(),
                seq: entry.seq,
            })
            .collect();
        drop(inner);

        matches.sort_by(|a, b| match b.score.total_cmp(&a.score) {
            Ordering::Equal => a.seq.cmp(&b.seq),
            other => other,
        });
        matches.truncate(k);
        Ok(matches)
    }

    /// Append an entry, returning its sequence number.
    #[instrument(level = "debug", skip(self, vector))]
    pub fn insert(&self, vector: &[f32], submission_id: &str) -> Result<u64> {
        let normalized = self.prepare(vector)?;
        let seq = self.inner.write().append(normalized, submission_id)?;
        debug!(seq, "Embedding indexed");
        Ok(seq)
    }

    /// Search, then insert, under one write lock.
    ///
    /// A concurrent call with the same vector is guaranteed to see this
    /// entry (or to be seen by it) in `prior`.
    #[instrument(level = "debug", skip(self, vector))]
    pub fn search_and_insert(
        &self,
        vector: &[f32],
        submission_id: &str,
    ) -> Result<CheckedInsert<SearchHit, u64>> {
        let normalized = self.prepare(vector)?;

        let mut writer = self.writer();
        let prior = writer.best_match(&normalized);
        let commit = writer.append(normalized, submission_id);
        drop(writer);

        if let Ok(seq) = &commit {
            debug!(seq, prior_score = prior.score, "Embedding indexed");
        }
        Ok(CheckedInsert { prior, commit })
    }

    /// Take the write lock for a multi-step registration.
    pub(crate) fn writer(&self) -> IndexWriter<'_> {
        IndexWriter {
            inner: self.inner.write(),
            undo: None,
        }
    }

    #[cfg(test)]
    pub(crate) fn fail_appends(&self) {
        self.inner.write().log.fail_appends();
    }
}

impl std::fmt::Debug for SimilarityIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimilarityIndex")
            .field("dimension", &self.dimension)
            .field("entries", &self.len())
            .finish()
    }
}
