//! HTTP embedding provider with retry and backoff.
//!
//! Talks to any OpenAI-compatible `/embeddings` endpoint (OpenAI, Ollama,
//! text-embeddings-inference, vLLM, ...). Transient failures are retried
//! with exponential backoff; everything else fails the call.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use backoff::{future::retry_notify, ExponentialBackoff};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use super::EmbeddingProvider;
use crate::error::{Result, SleuthError};

/// Configuration for the HTTP embedding client.
#[derive(Clone)]
pub struct HttpEmbeddingConfig {
    /// Base URL; `/embeddings` is appended
    pub base_url: String,
    /// Model name sent with every request
    pub model: String,
    /// Optional bearer token
    pub api_key: Option<String>,
    /// Expected vector dimension
    pub dimension: usize,
    /// Request timeout
    pub timeout: Duration,
    /// Maximum retry attempts for transient errors
    pub max_retries: u32,
    /// Initial retry interval
    pub initial_interval: Duration,
    /// Maximum retry interval
    pub max_interval: Duration,
    /// Allow plain `http://` endpoints (local model servers)
    pub allow_insecure: bool,
}

impl std::fmt::Debug for HttpEmbeddingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpEmbeddingConfig")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("dimension", &self.dimension)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .field("allow_insecure", &self.allow_insecure)
            .finish()
    }
}

impl HttpEmbeddingConfig {
    /// Create configuration from environment variables.
    ///
    /// Required: `SLEUTH_EMBEDDING_URL`
    /// Optional: `SLEUTH_EMBEDDING_MODEL` (default `all-MiniLM-L6-v2`),
    /// `SLEUTH_EMBEDDING_API_KEY`, `SLEUTH_EMBEDDING_DIM` (default 384),
    /// `SLEUTH_EMBEDDING_TIMEOUT_SECS` (default 10)
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("SLEUTH_EMBEDDING_URL").map_err(|_| {
            SleuthError::ConfigError("SLEUTH_EMBEDDING_URL environment variable not set".into())
        })?;

        let model = std::env::var("SLEUTH_EMBEDDING_MODEL")
            .unwrap_or_else(|_| "all-MiniLM-L6-v2".to_string());

        let dimension = std::env::var("SLEUTH_EMBEDDING_DIM")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(super::DEFAULT_EMBEDDING_DIMENSION);

        let timeout_secs = std::env::var("SLEUTH_EMBEDDING_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(10);

        let allow_insecure = base_url.starts_with("http://");

        Ok(Self {
            base_url,
            model,
            api_key: std::env::var("SLEUTH_EMBEDDING_API_KEY").ok(),
            dimension,
            timeout: Duration::from_secs(timeout_secs),
            max_retries: 3,
            initial_interval: Duration::from_millis(100),
            max_interval: Duration::from_secs(2),
            allow_insecure,
        })
    }
}

/// OpenAI-style embedding request.
#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

/// OpenAI-style embedding response.
#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

/// Embedding provider backed by a remote model server.
pub struct HttpEmbeddingProvider {
    client: Client,
    config: HttpEmbeddingConfig,
    endpoint: String,
}

impl HttpEmbeddingProvider {
    /// Create a new client with the given configuration.
    #[instrument(level = "debug", skip_all, fields(base_url = %config.base_url))]
    pub fn new(config: HttpEmbeddingConfig) -> Result<Self> {
        if config.dimension == 0 {
            return Err(SleuthError::ConfigError(
                "embedding dimension must be positive".into(),
            ));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .https_only(!config.allow_insecure)
            .build()
            .map_err(|e| {
                SleuthError::EmbeddingError(format!("Failed to create HTTP client: {e}"))
            })?;

        let endpoint = format!("{}/embeddings", config.base_url.trim_end_matches('/'));
        info!(model = %config.model, dimension = config.dimension, "HTTP embedding client created");

        Ok(Self {
            client,
            config,
            endpoint,
        })
    }

    async fn embed_once(
        &self,
        text: &str,
    ) -> std::result::Result<Vec<f32>, backoff::Error<SleuthError>> {
        let start = Instant::now();

        let mut request = self.client.post(&self.endpoint).json(&EmbeddingRequest {
            model: &self.config.model,
            input: text,
        });
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            let latency_ms = start.elapsed().as_millis() as u64;
            if is_transient_error(&e) {
                warn!(error = %e, latency_ms, "Transient error, will retry");
                backoff::Error::transient(SleuthError::EmbeddingError(format!(
                    "Transient error (will retry): {e}"
                )))
            } else {
                warn!(error = %e, latency_ms, "Permanent error, aborting");
                backoff::Error::permanent(SleuthError::EmbeddingError(format!(
                    "Embedding request failed: {e}"
                )))
            }
        })?;

        let status = response.status();
        debug!(status = %status, "Received HTTP response");

        if !status.is_success() {
            let err =
                SleuthError::EmbeddingError(format!("Embedding API returned status: {status}"));
            return if is_transient_status(status) {
                warn!(status = %status, "Transient HTTP status, will retry");
                Err(backoff::Error::transient(err))
            } else {
                warn!(status = %status, "Permanent HTTP error");
                Err(backoff::Error::permanent(err))
            };
        }

        let parsed: EmbeddingResponse = response.json().await.map_err(|e| {
            backoff::Error::permanent(SleuthError::EmbeddingError(format!(
                "Failed to parse embedding response: {e}"
            )))
        })?;

        let vector = parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| {
                backoff::Error::permanent(SleuthError::EmbeddingError(
                    "Empty embedding response".into(),
                ))
            })?;

        check_dimension(self.config.dimension, &vector).map_err(backoff::Error::permanent)?;

        debug!(
            latency_ms = start.elapsed().as_millis() as u64,
            "Embedding fetched successfully"
        );
        Ok(vector)
    }

    fn build_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.config.initial_interval,
            max_interval: self.config.max_interval,
            max_elapsed_time: Some(self.config.timeout * self.config.max_retries.max(1)),
            ..Default::default()
        }
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    #[instrument(level = "debug", skip_all, fields(model = %self.config.model, chars = text.len()))]
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        retry_notify(
            self.build_backoff(),
            || async { self.embed_once(text).await },
            |err: SleuthError, duration: Duration| {
                warn!(
                    error = %err,
                    retry_after_ms = duration.as_millis() as u64,
                    "Retry scheduled"
                );
            },
        )
        .await
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }

    fn provider_id(&self) -> String {
        format!("http:{}", self.config.model)
    }
}

/// Reject vectors whose length differs from the configured dimension.
fn check_dimension(expected: usize, vector: &[f32]) -> Result<()> {
    if vector.len() != expected {
        return Err(SleuthError::DimensionMismatch {
            expected,
            actual: vector.len(),
        });
    }
    Ok(())
}

/// Check if a reqwest error is transient and should be retried.
pub fn is_transient_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request()
}

/// Check if an HTTP status code indicates a transient error.
pub fn is_transient_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
            | StatusCode::BAD_GATEWAY
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> HttpEmbeddingConfig {
        HttpEmbeddingConfig {
            base_url: "http://127.0.0.1:8080/v1/".into(),
            model: "test-model".into(),
            api_key: Some("secret".into()),
            dimension: 8,
            timeout: Duration::from_secs(1),
            max_retries: 1,
            initial_interval: Duration::from_millis(10),
            max_interval: Duration::from_millis(20),
            allow_insecure: true,
        }
    }

    #[test]
    fn test_endpoint_strips_trailing_slash() {
        let provider = HttpEmbeddingProvider::new(config()).unwrap();
        assert_eq!(provider.endpoint, "http://127.0.0.1:8080/v1/embeddings");
        assert_eq!(provider.dimension(), 8);
        assert_eq!(provider.provider_id(), "http:test-model");
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let rendered = format!("{:?}", config());
        assert!(rendered.contains("[REDACTED]"));
        assert!(!rendered.contains("secret"));
    }

    #[test]
    fn test_zero_dimension_rejected() {
        let mut cfg = config();
        cfg.dimension = 0;
        assert!(HttpEmbeddingProvider::new(cfg).is_err());
    }

    #[test]
    fn test_check_dimension() {
        assert!(check_dimension(3, &[0.1, 0.2, 0.3]).is_ok());
        assert!(matches!(
            check_dimension(3, &[0.1]),
            Err(SleuthError::DimensionMismatch {
                expected: 3,
                actual: 1
            })
        ));
    }

    #[test]
    fn test_response_parsing() {
        let body = r#"{"object":"list","data":[{"object":"embedding","index":0,"embedding":[0.5,-0.25]}],"model":"m"}"#;
        let parsed: EmbeddingResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.data[0].embedding, vec![0.5, -0.25]);
    }

    #[test]
    fn test_transient_status_codes() {
        assert!(is_transient_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_transient_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(is_transient_status(StatusCode::GATEWAY_TIMEOUT));
        assert!(is_transient_status(StatusCode::BAD_GATEWAY));
        assert!(!is_transient_status(StatusCode::NOT_FOUND));
        assert!(!is_transient_status(StatusCode::INTERNAL_SERVER_ERROR));
    }
}
