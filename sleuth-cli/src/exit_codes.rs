//! Exit codes following sysexits.h conventions.
//!
//! These codes give scripts and CI jobs a way to tell a risky submission
//! apart from a broken setup.

use sleuth_core::SleuthError;

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// General error (catch-all).
pub const GENERAL_ERROR: i32 = 1;

/// Command line usage error (invalid arguments).
/// Maps to EX_USAGE from sysexits.h.
pub const USAGE_ERROR: i32 = 64;

/// Fraud severity reached the `--fail-on` threshold.
/// Maps to EX_DATAERR from sysexits.h.
pub const FRAUD_DETECTED: i32 = 65;

/// Cannot open or decode the input file.
/// Maps to EX_NOINPUT from sysexits.h.
pub const INPUT_ERROR: i32 = 66;

/// Embedding service unavailable.
/// Maps to EX_UNAVAILABLE from sysexits.h.
pub const SERVICE_UNAVAILABLE: i32 = 69;

/// Data directory I/O error.
/// Maps to EX_IOERR from sysexits.h.
pub const IO_ERROR: i32 = 74;

/// Invalid configuration.
/// Maps to EX_CONFIG from sysexits.h.
pub const CONFIG_ERROR: i32 = 78;

/// Exit code plus the message printed on stderr.
pub struct ExitCode {
    pub code: i32,
    pub message: String,
}

impl ExitCode {
    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        let message = format!("{err:#}");

        // A core error anywhere in the chain is authoritative
        let code = err
            .chain()
            .find_map(|cause| cause.downcast_ref::<SleuthError>())
            .map(code_for)
            .unwrap_or_else(|| classify_message(&message));

        Self { code, message }
    }
}

fn code_for(err: &SleuthError) -> i32 {
    match err {
        SleuthError::PersistenceFailure(_) | SleuthError::SerializationError(_) => IO_ERROR,
        SleuthError::ConfigError(_)
        | SleuthError::DimensionMismatch { .. }
        | SleuthError::HashLengthMismatch { .. } => CONFIG_ERROR,
        SleuthError::EmbeddingError(_) | SleuthError::HttpError(_) => SERVICE_UNAVAILABLE,
        SleuthError::PerceptualHashError(_) => INPUT_ERROR,
        SleuthError::InvalidFinding(_) | SleuthError::SignalFailed { .. } => GENERAL_ERROR,
    }
}

fn classify_message(message: &str) -> i32 {
    if message.contains("Failed to read file") {
        INPUT_ERROR
    } else if message.contains("--fail-on") {
        FRAUD_DETECTED
    } else if message.contains("Embedding") || message.contains("embedding") {
        SERVICE_UNAVAILABLE
    } else if message.contains("not registered") || message.contains("Failed to write") {
        IO_ERROR
    } else {
        GENERAL_ERROR
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_core_error_in_chain_wins() {
        let err = Err::<(), _>(SleuthError::PersistenceFailure("disk full".into()))
            .context("Failed to read file: ignored")
            .unwrap_err();
        let exit = ExitCode::from_anyhow(&err);
        assert_eq!(exit.code, IO_ERROR);
        assert!(exit.message.contains("disk full"));
    }

    #[test]
    fn test_dimension_mismatch_is_config_error() {
        let err = anyhow::Error::new(SleuthError::DimensionMismatch {
            expected: 384,
            actual: 768,
        });
        assert_eq!(ExitCode::from_anyhow(&err).code, CONFIG_ERROR);
    }

    #[test]
    fn test_message_fallbacks() {
        let cases = [
            ("Failed to read file: missing.pdf", INPUT_ERROR),
            ("Fraud severity HIGH meets --fail-on threshold MEDIUM", FRAUD_DETECTED),
            ("Submission was not registered: index: Persistence failure", IO_ERROR),
            ("something else", GENERAL_ERROR),
        ];
        for (message, code) in cases {
            let err = anyhow::anyhow!(message);
            assert_eq!(ExitCode::from_anyhow(&err).code, code, "{message}");
        }
    }
}
