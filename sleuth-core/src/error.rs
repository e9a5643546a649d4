use thiserror::Error;

#[derive(Error, Debug)]
pub enum SleuthError {
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Perceptual hash length mismatch: expected {expected} bits, got {actual} bits")]
    HashLengthMismatch { expected: u32, actual: u32 },

    #[error("Invalid finding: {0}")]
    InvalidFinding(String),

    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),

    #[error("Embedding error: {0}")]
    EmbeddingError(String),

    #[error("Perceptual hash error: {0}")]
    PerceptualHashError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Signal '{signal}' failed: {reason}")]
    SignalFailed { signal: String, reason: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[cfg(feature = "network")]
    #[error("HTTP request error: {0}")]
    HttpError(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, SleuthError>;
