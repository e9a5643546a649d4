//! Index statistics handler

use axum::{extract::State, Json};
use serde::Serialize;
use sleuth_core::EngineStats;
use utoipa::ToSchema;

use crate::state::AppState;

/// Index sizes and engine settings.
#[derive(Debug, Serialize, ToSchema)]
pub struct StatsResponse {
    /// Texts in the similarity index
    #[schema(example = 1520)]
    pub indexed_texts: usize,
    /// Distinct perceptual hashes
    #[schema(example = 830)]
    pub indexed_hashes: usize,
    /// Embedding dimension
    #[schema(example = 384)]
    pub dimension: usize,
    #[schema(example = 64)]
    pub hash_bits: u32,
    /// Cosine score at or above which texts are near-duplicates
    #[schema(example = 0.9)]
    pub duplicate_threshold: f32,
    /// Hamming distance at or below which images are near-duplicates
    #[schema(example = 0)]
    pub near_hash_distance: u32,
    #[schema(example = "hashing-384")]
    pub embedding_provider: String,
    pub persistent: bool,
}

impl From<EngineStats> for StatsResponse {
    fn from(stats: EngineStats) -> Self {
        Self {
            indexed_texts: stats.indexed_texts,
            indexed_hashes: stats.indexed_hashes,
            dimension: stats.dimension,
            hash_bits: stats.hash_bits,
            duplicate_threshold: stats.duplicate_threshold,
            near_hash_distance: stats.near_hash_distance,
            embedding_provider: stats.embedding_provider,
            persistent: stats.persistent,
        }
    }
}

/// GET /stats - Index sizes and engine settings
#[utoipa::path(
    get,
    path = "/stats",
    tag = "Health",
    responses((status = 200, description = "Engine statistics", body = StatsResponse))
)]
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(state.engine().stats().into())
}
