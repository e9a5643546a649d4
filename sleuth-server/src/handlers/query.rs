//! Duplicate lookup handler
//!
//! Handles POST /duplicates/query: a read-only check against everything
//! registered so far. Nothing is stored.

use axum::{extract::State, Json};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use sleuth_core::PerceptualHash;
use tracing::debug;
use utoipa::ToSchema;

use super::scan::DuplicateResponse;
use crate::error::ApiError;
use crate::state::AppState;

/// Request for a duplicate lookup.
///
/// At least one of `text`, `perceptual_hash` or `image_data` is required;
/// `perceptual_hash` and `image_data` are mutually exclusive.
#[derive(Debug, Deserialize, ToSchema)]
pub struct QueryRequest {
    /// Document text to compare against prior texts
    #[serde(default)]
    #[schema(example = "Invoice #12345, amount 500")]
    pub text: Option<String>,

    /// Hex-encoded perceptual hash (8 bytes = 16 hex chars)
    #[serde(default)]
    #[schema(example = "a1b2c3d4e5f67890")]
    pub perceptual_hash: Option<String>,

    /// Base64-encoded image to hash with the server's algorithm
    #[serde(default)]
    #[schema(example = "iVBORw0KGgo...")]
    pub image_data: Option<String>,

    /// Maximum Hamming distance for near-duplicate images
    /// (default: the server's configured distance)
    #[serde(default)]
    #[schema(example = 10)]
    pub max_distance: Option<u32>,
}

/// Response for a duplicate lookup.
#[derive(Debug, Serialize, ToSchema)]
pub struct QueryResponse {
    /// Whether any prior submission matched
    #[schema(example = true)]
    pub duplicate: bool,
    #[serde(flatten)]
    pub verdict: DuplicateResponse,
    /// Hash the lookup used, when an image was given
    #[schema(example = "a1b2c3d4e5f67890")]
    pub perceptual_hash: Option<String>,
}

/// Look up duplicates without registering
///
/// Text is matched by embedding similarity, images by perceptual hash
/// distance. When both are given, an exact image match wins; otherwise the
/// stronger of the two near matches is reported.
#[utoipa::path(
    post,
    path = "/duplicates/query",
    tag = "Scanning",
    request_body = QueryRequest,
    responses(
        (status = 200, description = "Duplicate verdict", body = QueryResponse),
        (status = 400, description = "Nothing to query, invalid hash or undecodable image"),
        (status = 503, description = "Image hashing or embedding unavailable")
    )
)]
pub async fn query_handler(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    let image_hash = resolve_image_hash(&state, &request)?;
    let text = request.text.as_deref().unwrap_or("");

    if image_hash.is_none() && text.trim().is_empty() {
        return Err(ApiError::bad_request(
            "Provide 'text', 'perceptual_hash' or 'image_data'",
        ));
    }

    let engine = state.engine();
    let max_distance = request
        .max_distance
        .unwrap_or(engine.config().near_hash_distance)
        .min(engine.hashes().hash_bits());

    let verdict = engine
        .check_with_distance(text, image_hash.as_ref(), max_distance)
        .await?;
    debug!(kind = %verdict.kind, max_distance, "Duplicate query");

    Ok(Json(QueryResponse {
        duplicate: verdict.is_duplicate(),
        verdict: DuplicateResponse::from(&verdict),
        perceptual_hash: image_hash.map(|h| h.to_hex()),
    }))
}

fn resolve_image_hash(
    state: &AppState,
    request: &QueryRequest,
) -> Result<Option<PerceptualHash>, ApiError> {
    match (&request.perceptual_hash, &request.image_data) {
        (Some(_), Some(_)) => Err(ApiError::bad_request(
            "Provide either 'perceptual_hash' or 'image_data', not both",
        )),
        (Some(hex), None) => {
            // Supplied hashes are taken to use the store's algorithm
            let algorithm = state.engine().config().hash_algorithm;
            let hash = PerceptualHash::from_hex(hex, algorithm).map_err(|e| {
                ApiError::bad_request(format!("Invalid hex perceptual_hash: {e}"))
            })?;
            state.engine().hashes().check_length(&hash)?;
            Ok(Some(hash))
        }
        (None, Some(image_data)) => {
            let image_bytes = BASE64
                .decode(image_data)
                .map_err(|e| ApiError::bad_request(format!("Invalid base64 image_data: {e}")))?;
            let hasher = state
                .image_hasher()
                .ok_or_else(|| ApiError::service_unavailable("Image hashing is not enabled"))?;
            if !hasher.supports(&image_bytes) {
                return Err(ApiError::bad_request(
                    "image_data is not a supported image format",
                ));
            }
            Ok(Some(hasher.hash_bytes(&image_bytes)?))
        }
        (None, None) => Ok(None),
    }
}
