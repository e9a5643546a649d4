//! Signal aggregation handler
//!
//! Handles POST /aggregate requests: score findings produced elsewhere
//! without touching the duplicate index.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use sleuth_core::{Finding, FindingKind, ScanVerdict};
use tracing::{debug, info};
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::state::AppState;
use crate::validation::validate_submission_id;

/// Largest number of findings accepted in one request
pub const MAX_FINDINGS: usize = 256;

/// A finding as submitted by a client.
#[derive(Debug, Deserialize, ToSchema)]
pub struct FindingInput {
    /// Finding kind, e.g. `PII` or `DUPLICATE_NEAR` (case-insensitive)
    #[schema(example = "METADATA_MISMATCH")]
    pub kind: String,
    /// Human-readable detail
    #[serde(default)]
    #[schema(example = "PDF created in 2024 but latest date in text is 2021")]
    pub description: String,
    /// Confidence in [0, 1]
    #[schema(example = 0.7)]
    pub confidence: f32,
}

/// Request for scoring a set of findings.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AggregateRequest {
    /// Identifier echoed back in the verdict
    #[serde(default)]
    #[schema(example = "claim-2024-001")]
    pub submission_id: Option<String>,
    pub findings: Vec<FindingInput>,
}

/// One scored finding.
#[derive(Debug, Serialize, ToSchema)]
pub struct FindingResponse {
    #[schema(example = "PII")]
    pub kind: String,
    #[schema(example = "PAN card number detected")]
    pub description: String,
    #[schema(example = 0.9)]
    pub confidence: f32,
}

impl From<&Finding> for FindingResponse {
    fn from(finding: &Finding) -> Self {
        Self {
            kind: finding.kind.as_str().to_string(),
            description: finding.description.clone(),
            confidence: finding.confidence,
        }
    }
}

/// Aggregated fraud verdict.
#[derive(Debug, Serialize, ToSchema)]
pub struct VerdictResponse {
    #[schema(example = "550e8400-e29b-41d4-a716-446655440000")]
    pub submission_id: String,
    /// Fraud score in [0, 100]
    #[schema(example = 45.0)]
    pub fraud_score: f32,
    /// NONE, LOW, MEDIUM or HIGH
    #[schema(example = "MEDIUM")]
    pub severity: String,
    /// Findings that contributed to the score
    pub findings: Vec<FindingResponse>,
    /// Findings rejected as malformed (unknown kind, confidence out of range)
    #[schema(example = 0)]
    pub dropped_findings: usize,
}

impl From<&ScanVerdict> for VerdictResponse {
    fn from(verdict: &ScanVerdict) -> Self {
        Self {
            submission_id: verdict.submission_id.clone(),
            fraud_score: verdict.fraud_score,
            severity: verdict.severity.as_str().to_string(),
            findings: verdict.findings.iter().map(FindingResponse::from).collect(),
            dropped_findings: verdict.dropped_findings,
        }
    }
}

/// Score a set of findings
///
/// Invalid findings are dropped and counted in `dropped_findings` rather
/// than failing the request. Several findings of the same kind count once.
#[utoipa::path(
    post,
    path = "/aggregate",
    tag = "Scoring",
    request_body = AggregateRequest,
    responses(
        (status = 200, description = "Aggregated verdict", body = VerdictResponse),
        (status = 400, description = "Too many findings or invalid submission id")
    )
)]
pub async fn aggregate_handler(
    State(state): State<AppState>,
    Json(request): Json<AggregateRequest>,
) -> Result<Json<VerdictResponse>, ApiError> {
    if request.findings.len() > MAX_FINDINGS {
        return Err(ApiError::bad_request(format!(
            "At most {MAX_FINDINGS} findings per request, got {}",
            request.findings.len()
        )));
    }
    let submission_id = match request.submission_id {
        Some(id) => {
            validate_submission_id(&id)?;
            id
        }
        None => "adhoc".to_string(),
    };

    let submitted = request.findings.len();
    let mut unknown_kinds = 0;
    let findings: Vec<Finding> = request
        .findings
        .into_iter()
        .filter_map(|input| match input.kind.parse::<FindingKind>() {
            Ok(kind) => Some(Finding {
                kind,
                description: input.description,
                confidence: input.confidence,
            }),
            Err(e) => {
                debug!(error = %e, "Dropping finding with unknown kind");
                unknown_kinds += 1;
                None
            }
        })
        .collect();

    // The aggregator re-validates confidences and drops what fails
    let mut verdict = state.aggregator().aggregate(&submission_id, findings);
    verdict.dropped_findings += unknown_kinds;

    info!(
        submission_id = %verdict.submission_id,
        submitted,
        dropped = verdict.dropped_findings,
        score = verdict.fraud_score,
        severity = %verdict.severity,
        "Aggregated findings"
    );

    Ok(Json(VerdictResponse::from(&verdict)))
}
