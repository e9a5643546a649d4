//! API error handling module
//!
//! Provides a unified error type for all API endpoints with structured error variants.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sleuth_core::SleuthError;
use thiserror::Error;

/// API error type with structured variants for different error categories
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad request - client provided invalid input
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Upload exceeds the configured size limit
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// Internal server error - unexpected server-side failure
    #[error("Internal error: {0}")]
    Internal(String),

    /// Service unavailable - required service is not configured or available
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Error from the detection engine
    #[error("Sleuth error: {0}")]
    Sleuth(#[from] SleuthError),
}

impl ApiError {
    /// Create a bad request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    /// Create a payload too large error
    pub fn payload_too_large(message: impl Into<String>) -> Self {
        Self::PayloadTooLarge(message.into())
    }

    /// Create an internal server error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create a service unavailable error
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable(message.into())
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Sleuth(e) => match e {
                // Embedding backend down → 503
                SleuthError::EmbeddingError(_) | SleuthError::HttpError(_) => {
                    StatusCode::SERVICE_UNAVAILABLE
                }

                // Client-provided hash, image or finding is unusable → 400
                SleuthError::HashLengthMismatch { .. }
                | SleuthError::PerceptualHashError(_)
                | SleuthError::InvalidFinding(_) => StatusCode::BAD_REQUEST,

                // Index or storage state is inconsistent with the server → 500
                SleuthError::DimensionMismatch { .. }
                | SleuthError::PersistenceFailure(_)
                | SleuthError::SerializationError(_)
                | SleuthError::SignalFailed { .. }
                | SleuthError::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Get the error code for programmatic error handling
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "INVALID_INPUT",
            Self::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            Self::Sleuth(e) => match e {
                SleuthError::DimensionMismatch { .. } => "DIMENSION_MISMATCH",
                SleuthError::HashLengthMismatch { .. } => "HASH_LENGTH_MISMATCH",
                SleuthError::InvalidFinding(_) => "INVALID_FINDING",
                SleuthError::PersistenceFailure(_) => "PERSISTENCE_FAILURE",
                SleuthError::EmbeddingError(_) => "EMBEDDING_UNAVAILABLE",
                SleuthError::HttpError(_) => "UPSTREAM_ERROR",
                SleuthError::PerceptualHashError(_) => "INVALID_IMAGE",
                SleuthError::SerializationError(_) => "SERIALIZATION_ERROR",
                SleuthError::SignalFailed { .. } => "SIGNAL_FAILED",
                SleuthError::ConfigError(_) => "CONFIG_ERROR",
            },
        }
    }

    /// Get sanitized error message for client response
    fn client_message(&self) -> String {
        match self {
            // Sanitize internal details; client-side problems keep their specifics
            Self::Sleuth(e) => match e {
                SleuthError::HashLengthMismatch { expected, actual } => {
                    format!("Perceptual hash must be {expected} bits, got {actual}")
                }
                SleuthError::InvalidFinding(detail) => format!("Invalid finding: {detail}"),
                SleuthError::PerceptualHashError(_) => {
                    "Image could not be decoded or hashed".to_string()
                }
                SleuthError::EmbeddingError(_) | SleuthError::HttpError(_) => {
                    "Embedding service unavailable".to_string()
                }
                SleuthError::PersistenceFailure(_) => "Failed to persist submission".to_string(),
                SleuthError::DimensionMismatch { .. }
                | SleuthError::SerializationError(_)
                | SleuthError::SignalFailed { .. }
                | SleuthError::ConfigError(_) => "Internal processing error".to_string(),
            },
            Self::Internal(_) => "Internal server error".to_string(),
            // For other errors, use the Display message
            _ => self.to_string(),
        }
    }

    /// Get the error category for logging
    fn error_category(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::PayloadTooLarge(_) => "payload_too_large",
            Self::Internal(_) => "internal",
            Self::ServiceUnavailable(_) => "service_unavailable",
            Self::Sleuth(_) => "sleuth",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let category = self.error_category();
        let code = self.error_code();
        let internal_message = self.to_string();
        let client_message = self.client_message();

        if status.is_server_error() {
            tracing::error!(
                status = %status,
                category = category,
                code = code,
                error = %internal_message,
                "Server error"
            );
        } else {
            tracing::warn!(
                status = %status,
                category = category,
                code = code,
                error = %internal_message,
                "Client error"
            );
        }

        // All error responses include a `code` field for programmatic error handling
        let body = serde_json::json!({
            "error": client_message,
            "code": code,
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (
                ApiError::from(SleuthError::HashLengthMismatch {
                    expected: 64,
                    actual: 32,
                }),
                StatusCode::BAD_REQUEST,
                "HASH_LENGTH_MISMATCH",
            ),
            (
                ApiError::from(SleuthError::EmbeddingError("connection refused".into())),
                StatusCode::SERVICE_UNAVAILABLE,
                "EMBEDDING_UNAVAILABLE",
            ),
            (
                ApiError::from(SleuthError::PersistenceFailure("disk full".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
                "PERSISTENCE_FAILURE",
            ),
            (
                ApiError::payload_too_large("30 MB"),
                StatusCode::PAYLOAD_TOO_LARGE,
                "PAYLOAD_TOO_LARGE",
            ),
        ];

        for (error, status, code) in cases {
            assert_eq!(error.status_code(), status);
            assert_eq!(error.error_code(), code);
        }
    }

    #[test]
    fn test_internal_details_are_hidden() {
        let error = ApiError::from(SleuthError::PersistenceFailure(
            "/var/lib/sleuth/vectors.log: No space left on device".into(),
        ));
        assert!(!error.client_message().contains("/var/lib"));

        let error = ApiError::internal("task panicked at src/foo.rs");
        assert_eq!(error.client_message(), "Internal server error");
    }
}
