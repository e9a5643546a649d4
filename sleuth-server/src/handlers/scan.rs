//! Scan handler
//!
//! Handles POST /scan requests: run every forensic signal on an upload,
//! check it against prior submissions and register it.

use axum::{
    extract::{Multipart, State},
    Json,
};
use serde::Serialize;
use sleuth_core::{DuplicateVerdict, Registration, ScanReport, SignalStatus, Submission};
use tracing::info;
use utoipa::ToSchema;

use super::aggregate::VerdictResponse;
use crate::error::ApiError;
use crate::multipart::MultipartFields;
use crate::state::AppState;
use crate::validation::validate_submission_id;

/// Duplicate check outcome.
#[derive(Debug, Serialize, ToSchema)]
pub struct DuplicateResponse {
    /// UNIQUE, NEAR_DUPLICATE or EXACT_DUPLICATE
    #[schema(example = "NEAR_DUPLICATE")]
    pub kind: String,
    #[schema(example = 0.97)]
    pub confidence: f32,
    /// Submission this one duplicates
    #[schema(example = "550e8400-e29b-41d4-a716-446655440000")]
    pub matched_submission: Option<String>,
    /// Best cosine similarity against prior texts
    #[schema(example = 0.97)]
    pub text_score: Option<f32>,
    /// Hamming distance to the closest prior image in range
    #[schema(example = 0)]
    pub image_distance: Option<u32>,
}

impl From<&DuplicateVerdict> for DuplicateResponse {
    fn from(verdict: &DuplicateVerdict) -> Self {
        Self {
            kind: verdict.kind.as_str().to_string(),
            confidence: verdict.confidence,
            matched_submission: verdict.matched_submission.clone(),
            text_score: verdict.text_score,
            image_distance: verdict.image_distance,
        }
    }
}

/// Whether the submission was stored for future comparisons.
#[derive(Debug, Serialize, ToSchema)]
pub struct RegistrationResponse {
    /// committed, skipped or failed
    #[schema(example = "committed")]
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl From<&Registration> for RegistrationResponse {
    fn from(registration: &Registration) -> Self {
        match registration {
            Registration::Committed => Self {
                status: "committed",
                reason: None,
            },
            Registration::Skipped => Self {
                status: "skipped",
                reason: None,
            },
            // Storage paths stay in the server log
            Registration::Failed { .. } => Self {
                status: "failed",
                reason: Some("Submission could not be stored".to_string()),
            },
        }
    }
}

/// Outcome of one forensic signal.
#[derive(Debug, Serialize, ToSchema)]
pub struct SignalResponse {
    #[schema(example = "pii_scanner")]
    pub name: String,
    /// ok or failed
    #[schema(example = "ok")]
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Findings this signal contributed
    #[schema(example = 1)]
    pub findings: usize,
}

/// Response for a completed scan
#[derive(Debug, Serialize, ToSchema)]
pub struct ScanResponse {
    pub verdict: VerdictResponse,
    /// Absent when the duplicate check itself could not run
    pub duplicate: Option<DuplicateResponse>,
    pub registration: RegistrationResponse,
    /// Hex perceptual hash, for image uploads
    #[schema(example = "a1b2c3d4e5f67890")]
    pub perceptual_hash: Option<String>,
    #[schema(example = "statement.pdf")]
    pub file_name: Option<String>,
    /// Characters of text extracted or supplied
    #[schema(example = 1204)]
    pub text_chars: usize,
    pub signals: Vec<SignalResponse>,
    #[schema(example = "2026-01-07T10:00:00Z")]
    pub created_at: String,
}

impl From<&ScanReport> for ScanResponse {
    fn from(report: &ScanReport) -> Self {
        Self {
            verdict: VerdictResponse::from(&report.verdict),
            duplicate: report.duplicate.as_ref().map(DuplicateResponse::from),
            registration: RegistrationResponse::from(&report.registration),
            perceptual_hash: report.perceptual_hash.clone(),
            file_name: report.file_name.clone(),
            text_chars: report.text_chars,
            signals: report
                .signals
                .iter()
                .map(|signal| {
                    let (status, reason) = match &signal.status {
                        SignalStatus::Ok => ("ok", None),
                        SignalStatus::Failed { reason } => ("failed", Some(reason.clone())),
                    };
                    SignalResponse {
                        name: signal.name.clone(),
                        status,
                        reason,
                        findings: signal.findings,
                    }
                })
                .collect(),
            created_at: report.created_at.to_rfc3339(),
        }
    }
}

/// Scan an uploaded document or image
///
/// Accepts multipart/form-data with:
/// - **file** (required): the document or image (PDF, image, plain text)
/// - **text** (optional): document text, skipping extraction
/// - **submission_id** (optional): caller-chosen id, otherwise a UUID v4
///
/// The submission is registered, so a later upload of the same content is
/// reported as a duplicate of this one.
#[utoipa::path(
    post,
    path = "/scan",
    tag = "Scanning",
    request_body(content_type = "multipart/form-data", description = "file (required), text, submission_id"),
    responses(
        (status = 200, description = "Scan report", body = ScanResponse),
        (status = 400, description = "Missing file, unsupported type or invalid submission id"),
        (status = 413, description = "File exceeds the upload limit")
    )
)]
pub async fn scan_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ScanResponse>, ApiError> {
    let mut fields = MultipartFields::parse(&mut multipart, state.max_file_size).await?;
    let file = fields.take_file()?;

    let mut submission = Submission::new(file.data);
    if let Some(id) = fields.get_text("submission_id") {
        validate_submission_id(id)?;
        submission = submission.with_id(id);
    }
    if let Some(text) = fields.get_text("text") {
        submission = submission.with_text(text);
    }
    if let Some(name) = file.file_name {
        submission = submission.with_file_name(name);
    }

    info!(
        submission_id = %submission.id,
        bytes = submission.bytes.len(),
        content_type = ?file.content_type,
        "Scanning upload"
    );

    let report = state.pipeline.scan(submission).await;
    Ok(Json(ScanResponse::from(&report)))
}
