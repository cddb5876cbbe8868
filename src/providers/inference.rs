use async_trait::async_trait;
use log::{debug, error, warn};
use rand::Rng;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::errors::ProviderError;
use crate::providers::{ModelSpec, TranslationBackend};

/// Upper bound for a single retry delay
const MAX_BACKOFF_MS: u64 = 60_000;

/// Exponential delay before retry `attempt` (1-based), capped at `MAX_BACKOFF_MS`
fn backoff_delay_ms(base_ms: u64, attempt: u32) -> u64 {
    let factor = 1u64.checked_shl(attempt.saturating_sub(1)).unwrap_or(u64::MAX);
    base_ms.saturating_mul(factor).min(MAX_BACKOFF_MS)
}

/// Client for an HTTP model server exposing `POST /translate`
#[derive(Debug, Clone)]
pub struct HttpInferenceBackend {
    /// Base URL of the model server
    base_url: Url,
    /// HTTP client for making requests
    client: Client,
    /// Maximum number of retry attempts
    max_retries: u32,
    /// Base backoff time in milliseconds for exponential backoff
    backoff_base_ms: u64,
}

/// Translate request body
#[derive(Debug, Serialize, Deserialize)]
pub struct InferenceRequest {
    /// Text to translate
    pub text: String,
    /// Source language code
    pub source_lang: String,
    /// Target language code
    pub target_lang: String,
    /// Model identifier or path
    pub model: String,
}

/// Translate response body
#[derive(Debug, Serialize, Deserialize)]
pub struct InferenceResponse {
    /// Translated text
    pub translated_text: String,
    /// Error reported by the server, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HttpInferenceBackend {
    /// Create a new client
    ///
    /// # Arguments
    /// * `endpoint` - Base URL of the model server
    /// * `timeout` - Per-request HTTP timeout
    /// * `max_retries` - Retries for transient failures
    /// * `backoff_base_ms` - Base delay, doubled on each retry
    pub fn new(endpoint: &str, timeout: Duration, max_retries: u32, backoff_base_ms: u64) -> Result<Self, ProviderError> {
        let base_url = Url::parse(endpoint)
            .map_err(|e| ProviderError::ConnectionError(format!("Invalid endpoint '{}': {}", endpoint, e)))?;

        let client = Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(16)
            .tcp_keepalive(Duration::from_secs(60))
            .build()
            .map_err(|e| ProviderError::ConnectionError(e.to_string()))?;

        Ok(Self {
            base_url,
            client,
            max_retries,
            backoff_base_ms,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ProviderError> {
        self.base_url
            .join(path)
            .map_err(|e| ProviderError::RequestFailed(format!("Invalid URL path '{}': {}", path, e)))
    }

    async fn send_once(&self, url: &Url, request: &InferenceRequest) -> Result<String, ProviderError> {
        let response = self
            .client
            .post(url.clone())
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    ProviderError::ConnectionError(e.to_string())
                } else {
                    ProviderError::RequestFailed(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::RequestFailed(format!("Failed to read response body: {}", e)))?;

        if !status.is_success() {
            return Err(ProviderError::ApiError {
                status_code: status.as_u16(),
                message: body,
            });
        }

        let parsed: InferenceResponse = serde_json::from_str(&body).map_err(|e| {
            let preview: String = body.chars().take(200).collect();
            ProviderError::ParseError(format!("{} (body: {})", e, preview))
        })?;

        if let Some(message) = parsed.error {
            return Err(ProviderError::ApiError {
                status_code: status.as_u16(),
                message,
            });
        }

        Ok(parsed.translated_text)
    }
}

#[async_trait]
impl TranslationBackend for HttpInferenceBackend {
    async fn translate(
        &self,
        model: &ModelSpec,
        text: &str,
        source_language: &str,
        target_language: &str,
    ) -> Result<String, ProviderError> {
        let url = self.endpoint("translate")?;
        let request = InferenceRequest {
            text: text.to_string(),
            source_lang: source_language.to_string(),
            target_lang: target_language.to_string(),
            model: model.model_id().to_string(),
        };

        let mut attempt = 0;
        loop {
            match self.send_once(&url, &request).await {
                Ok(translated) => {
                    debug!("{} {}->{} translated {} chars", model, source_language, target_language, text.len());
                    return Ok(translated);
                }
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    let backoff_ms = backoff_delay_ms(self.backoff_base_ms, attempt);
                    let delay_ms = backoff_ms + rand::rng().random_range(0..=backoff_ms / 4);
                    warn!(
                        "{} call failed ({}), retry {}/{} in {}ms",
                        model, e, attempt, self.max_retries, delay_ms
                    );
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }
                Err(e) => {
                    error!("{} call failed: {}", model, e);
                    return Err(e);
                }
            }
        }
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        let url = self.endpoint("supported_langs")?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ProviderError::ConnectionError(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(ProviderError::ApiError {
                status_code: response.status().as_u16(),
                message: "Model server health check failed".to_string(),
            })
        }
    }
}
