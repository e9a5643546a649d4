//! Upload validation module
//!
//! Provides validation utilities for multipart file uploads.

use crate::error::ApiError;

/// Allowed MIME type categories for submissions
const ALLOWED_MIME_PREFIXES: &[&str] = &[
    "image/",
    "text/",
    "application/pdf",
    "application/octet-stream",
];

/// Longest submission id accepted from clients
pub const MAX_SUBMISSION_ID_LEN: usize = 128;

/// Validates the Content-Type of an uploaded file
///
/// Accepts:
/// - image/* (image/jpeg, image/png, image/webp, etc.)
/// - text/* (plain-text statements and exports)
/// - application/pdf
/// - application/octet-stream (binary data)
///
/// Returns an error if the Content-Type is not supported.
pub fn validate_content_type(content_type: Option<&str>) -> Result<(), ApiError> {
    match content_type {
        Some(ct) => {
            let ct_lower = ct.to_lowercase();
            if ALLOWED_MIME_PREFIXES
                .iter()
                .any(|prefix| ct_lower.starts_with(prefix))
            {
                Ok(())
            } else {
                Err(ApiError::bad_request(format!(
                    "Unsupported Content-Type: '{}'. Allowed types: image/*, text/*, application/pdf, application/octet-stream",
                    ct
                )))
            }
        }
        // Allow missing Content-Type (treat as binary)
        None => Ok(()),
    }
}

/// Validates the size of an uploaded file
///
/// Returns an error if the file exceeds the maximum size.
pub fn validate_file_size(size: usize, max_size: usize) -> Result<(), ApiError> {
    if size > max_size {
        let max_mb = max_size / (1024 * 1024);
        let actual_mb = size / (1024 * 1024);
        Err(ApiError::payload_too_large(format!(
            "File too large: {} MB exceeds maximum of {} MB",
            actual_mb, max_mb
        )))
    } else if size == 0 {
        Err(ApiError::bad_request("Uploaded file is empty"))
    } else {
        Ok(())
    }
}

/// Validates a client-chosen submission id
///
/// Ids end up in logs and in the persisted record logs, so only a
/// conservative character set is allowed.
pub fn validate_submission_id(id: &str) -> Result<(), ApiError> {
    let valid_chars = id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':'));
    if id.is_empty() || id.len() > MAX_SUBMISSION_ID_LEN || !valid_chars {
        return Err(ApiError::bad_request(format!(
            "submission_id must be 1-{MAX_SUBMISSION_ID_LEN} characters of [A-Za-z0-9-_.:]"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_content_type_image() {
        assert!(validate_content_type(Some("image/jpeg")).is_ok());
        assert!(validate_content_type(Some("image/png")).is_ok());
        assert!(validate_content_type(Some("IMAGE/JPEG")).is_ok()); // case insensitive
    }

    #[test]
    fn test_validate_content_type_documents() {
        assert!(validate_content_type(Some("application/pdf")).is_ok());
        assert!(validate_content_type(Some("text/plain; charset=utf-8")).is_ok());
        assert!(validate_content_type(Some("application/octet-stream")).is_ok());
    }

    #[test]
    fn test_validate_content_type_none() {
        assert!(validate_content_type(None).is_ok());
    }

    #[test]
    fn test_validate_content_type_rejected() {
        assert!(validate_content_type(Some("video/mp4")).is_err());
        assert!(validate_content_type(Some("application/json")).is_err());
        assert!(validate_content_type(Some("application/zip")).is_err());
    }

    #[test]
    fn test_validate_file_size() {
        let max = 10 * 1024 * 1024; // 10 MB
        assert!(validate_file_size(1024, max).is_ok());
        assert!(validate_file_size(max, max).is_ok()); // exactly max
        assert!(matches!(
            validate_file_size(max + 1, max),
            Err(ApiError::PayloadTooLarge(_))
        ));
        assert!(matches!(
            validate_file_size(0, max),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn test_validate_submission_id() {
        assert!(validate_submission_id("550e8400-e29b-41d4-a716-446655440000").is_ok());
        assert!(validate_submission_id("claim:2024.001_a").is_ok());
        assert!(validate_submission_id("").is_err());
        assert!(validate_submission_id("has space").is_err());
        assert!(validate_submission_id(&"x".repeat(129)).is_err());
    }
}
