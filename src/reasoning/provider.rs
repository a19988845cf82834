use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// One logical "generate text from a prompt" request.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationRequest {
    /// Prompt contents (transcript context plus the question)
    pub contents: String,
    pub model_id: String,
    pub max_output_tokens: u32,
    pub temperature: f32,
}

impl GenerationRequest {
    pub fn new(contents: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            contents: contents.into(),
            model_id: model_id.into(),
            max_output_tokens: 1024,
            temperature: 0.7,
        }
    }

    /// Same request, retargeted at another model.
    pub fn with_model(&self, model_id: &str) -> Self {
        Self {
            model_id: model_id.to_string(),
            ..self.clone()
        }
    }
}

/// Generation failure classification.
///
/// Only `Overloaded` is retryable; everything else propagates
/// immediately from the resilience layer.
#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    /// Explicit overload/unavailable/busy signal from the provider.
    #[error("provider overloaded: {0}")]
    Overloaded(String),
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("quota exceeded: {0}")]
    Quota(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("provider error: {0}")]
    Provider(String),
}

impl GenerationError {
    pub fn is_transient_overload(&self) -> bool {
        matches!(self, GenerationError::Overloaded(_))
    }
}

/// A reasoning model backend.
///
/// Two concrete variants exist, selected by configuration at
/// construction time: a cloud HTTPS API and a local endpoint. There is
/// no runtime-mutable provider switch.
#[async_trait]
pub trait ReasoningProvider: Send + Sync {
    /// One unwrapped generation call. A successful call may still
    /// return blank text; callers decide what blank means.
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError>;

    /// Provider name for logging
    fn name(&self) -> &str;
}

fn classify_status(status: reqwest::StatusCode, body: String) -> GenerationError {
    match status.as_u16() {
        // Overload/unavailable/busy signals are the transient class.
        503 | 529 => GenerationError::Overloaded(body),
        401 | 403 => GenerationError::Auth(body),
        400 | 422 => GenerationError::InvalidRequest(body),
        429 => GenerationError::Quota(body),
        _ => GenerationError::Provider(format!("{}: {}", status, body)),
    }
}

/// Cloud reasoning provider speaking a JSON generate API.
pub struct CloudProvider {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
}

#[derive(Serialize)]
struct CloudRequest<'a> {
    contents: &'a str,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct CloudResponse {
    #[serde(default)]
    text: String,
}

impl CloudProvider {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl ReasoningProvider for CloudProvider {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let url = format!(
            "{}/v1/models/{}:generate",
            self.endpoint.trim_end_matches('/'),
            request.model_id
        );

        debug!("Cloud generation call: {} ({})", request.model_id, url);

        let response = self
            .http
            .post(&url)
            .header("x-api-key", &self.api_key)
            .json(&CloudRequest {
                contents: &request.contents,
                max_output_tokens: request.max_output_tokens,
                temperature: request.temperature,
            })
            .send()
            .await
            .map_err(|e| GenerationError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, body));
        }

        let parsed: CloudResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::Provider(format!("malformed response: {e}")))?;

        Ok(parsed.text)
    }

    fn name(&self) -> &str {
        "cloud"
    }
}

/// Local reasoning provider (ollama-style endpoint).
pub struct LocalProvider {
    http: reqwest::Client,
    endpoint: String,
}

#[derive(Serialize)]
struct LocalRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: LocalOptions,
}

#[derive(Serialize)]
struct LocalOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Deserialize)]
struct LocalResponse {
    #[serde(default)]
    response: String,
}

impl LocalProvider {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl ReasoningProvider for LocalProvider {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let url = format!("{}/api/generate", self.endpoint.trim_end_matches('/'));

        debug!("Local generation call: {} ({})", request.model_id, url);

        let response = self
            .http
            .post(&url)
            .json(&LocalRequest {
                model: &request.model_id,
                prompt: &request.contents,
                stream: false,
                options: LocalOptions {
                    temperature: request.temperature,
                    num_predict: request.max_output_tokens,
                },
            })
            .send()
            .await
            .map_err(|e| GenerationError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, body));
        }

        let parsed: LocalResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::Provider(format!("malformed response: {e}")))?;

        Ok(parsed.response)
    }

    fn name(&self) -> &str {
        "local"
    }
}
