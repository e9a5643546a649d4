//! Persisted duplicate-detection state.
//!
//! - [`SimilarityIndex`]: brute-force cosine nearest-neighbour index over
//!   normalized text embeddings
//! - [`PerceptualHashSet`]: exact and Hamming-near membership over image
//!   fingerprints
//!
//! Both are append-only, guarded by their own `RwLock`, and write each
//! mutation to a [`RecordLog`] before applying it in memory. A
//! [`StoreManifest`] pins the settings a data directory was written with.

mod hashset;
pub mod log;
mod manifest;
mod similarity;

pub use hashset::{HashMatch, HashRecord, PerceptualHashSet};
pub use log::RecordLog;
pub use manifest::StoreManifest;
pub use similarity::{IndexEntry, IndexMatch, SearchHit, SimilarityIndex};

use crate::error::Result;

/// Outcome of an atomic lookup-then-insert.
///
/// `prior` is what the lookup saw before this call's insert; `commit` is
/// whether the insert reached durable storage. A failed commit leaves the
/// in-memory state untouched, and `prior` is still valid.
#[derive(Debug)]
pub struct CheckedInsert<P, C> {
    pub prior: P,
    pub commit: Result<C>,
}
