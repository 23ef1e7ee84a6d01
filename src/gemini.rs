use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),

    #[error("request timed out")]
    Timeout(#[source] reqwest::Error),

    #[error("Gemini API error ({status}): {message}")]
    Http { status: StatusCode, message: String },

    #[error("decode Gemini response: {0}")]
    Decode(String),

    #[error("Gemini output text is empty")]
    EmptyResponse,
}

impl GenerateError {
    fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err)
        } else {
            Self::Network(err)
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout(_) => true,
            Self::Http { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            Self::Decode(_) | Self::EmptyResponse => false,
        }
    }
}

/// Text completion backend used by the tagging pipeline and the chat endpoints.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, model: &str, prompt: &str) -> Result<String, GenerateError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: usize,
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            initial_backoff: Duration::ZERO,
        }
    }

    /// Delay before retry number `retry` (0-based): 1x, 2x, 4x, ...
    pub fn backoff_for(&self, retry: usize) -> Duration {
        let factor = 2u32.saturating_pow(u32::try_from(retry).unwrap_or(u32::MAX));
        self.initial_backoff.saturating_mul(factor)
    }

    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, GenerateError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, GenerateError>>,
    {
        let attempts = self.max_retries.saturating_add(1);
        let mut attempt = 0usize;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < attempts && err.is_retryable() => {
                    let delay = self.backoff_for(attempt - 1);
                    tracing::warn!(
                        attempt,
                        attempts,
                        ?delay,
                        error = %err,
                        "Gemini call failed; retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

pub fn generate_content_endpoint(base_url: &str, model: &str) -> String {
    let base_url = base_url.trim_end_matches('/');
    format!("{base_url}/models/{model}:generateContent")
}

#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    retry: RetryPolicy,
}

impl GeminiClient {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn generate_once(&self, model: &str, prompt: &str) -> Result<String, GenerateError> {
        let endpoint = generate_content_endpoint(&self.base_url, model);
        let body = serde_json::json!({
            "contents": [
                { "role": "user", "parts": [{ "text": prompt }] }
            ],
        });

        let response = self
            .client
            .post(&endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(GenerateError::from_reqwest)?;

        let status = response.status();
        let raw = response.text().await.map_err(GenerateError::from_reqwest)?;
        if !status.is_success() {
            let message = parse_error_message(&raw).unwrap_or(raw);
            return Err(GenerateError::Http { status, message });
        }

        let value: serde_json::Value =
            serde_json::from_str(&raw).map_err(|err| GenerateError::Decode(err.to_string()))?;
        extract_candidate_text(&value)
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, model: &str, prompt: &str) -> Result<String, GenerateError> {
        tracing::debug!(model, prompt_chars = prompt.len(), "Gemini generateContent");
        self.retry
            .run(|| self.generate_once(model, prompt))
            .await
    }
}

fn parse_error_message(raw_json: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(raw_json).ok()?;
    let message = value.get("error")?.get("message")?.as_str()?.to_owned();
    Some(message)
}

fn extract_candidate_text(value: &serde_json::Value) -> Result<String, GenerateError> {
    let parts = value
        .pointer("/candidates/0/content/parts")
        .and_then(|v| v.as_array())
        .ok_or_else(|| GenerateError::Decode("missing `candidates[0].content.parts`".to_owned()))?;

    let text = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(|v| v.as_str()))
        .collect::<String>();

    if text.trim().is_empty() {
        return Err(GenerateError::EmptyResponse);
    }
    Ok(text)
}
