//! Generative language model adapters used for answer synthesis.
//!
//! Both adapters issue HTTP requests directly to the provider with a bounded timeout. Neither
//! retries; a failed generation surfaces to the caller, which degrades the answer instead.

use std::time::Duration;

use crate::config::{Config, GenerationProvider};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

/// Errors surfaced while generating text.
#[derive(Debug, Error)]
pub enum GenerationClientError {
    /// Provider was unreachable or the endpoint does not exist.
    #[error("Generation provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider returned an error response.
    #[error("Failed to generate text: {0}")]
    GenerationFailed(String),
    /// Provider response could not be parsed.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
}

/// Request payload passed to the generative provider.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Model identifier understood by the provider.
    pub model: String,
    /// Fully assembled prompt.
    pub prompt: String,
    /// Sampling temperature.
    pub temperature: f32,
}

/// Interface implemented by generative providers.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Generate a completion for the supplied prompt.
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationClientError>;
}

/// Build the generation client selected by configuration.
pub fn build_generation_client(
    config: &Config,
) -> Result<Box<dyn GenerationClient>, GenerationClientError> {
    let timeout = Duration::from_secs(config.request_timeout_secs);
    let client: Box<dyn GenerationClient> = match config.generation_provider {
        GenerationProvider::Ollama => Box::new(OllamaGenerationClient::new(
            config.ollama_url.clone(),
            timeout,
        )?),
        GenerationProvider::Gemini => {
            let api_key = config.gemini_api_key.clone().ok_or_else(|| {
                GenerationClientError::ProviderUnavailable("GEMINI_API_KEY is not set".into())
            })?;
            Box::new(GeminiGenerationClient::new(
                config.gemini_base_url.clone(),
                api_key,
                timeout,
            )?)
        }
    };
    tracing::info!(
        provider = config.generation_provider.label(),
        model = %config.generation_model,
        "Generation client ready"
    );
    Ok(client)
}

fn http_client(timeout: Duration) -> Result<Client, GenerationClientError> {
    Client::builder()
        .user_agent("docqa/generation")
        .timeout(timeout)
        .build()
        .map_err(|error| GenerationClientError::ProviderUnavailable(error.to_string()))
}

async fn check_status(
    provider: &str,
    endpoint: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, GenerationClientError> {
    if response.status() == StatusCode::NOT_FOUND {
        return Err(GenerationClientError::ProviderUnavailable(format!(
            "{provider} endpoint {endpoint} returned 404"
        )));
    }
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(GenerationClientError::GenerationFailed(format!(
            "{provider} returned {status}: {body}"
        )));
    }
    Ok(response)
}

/// Client for the Ollama `/api/generate` endpoint.
pub struct OllamaGenerationClient {
    http: Client,
    base_url: String,
}

impl OllamaGenerationClient {
    /// Construct a client targeting `base_url`.
    pub fn new(base_url: String, timeout: Duration) -> Result<Self, GenerationClientError> {
        Ok(Self {
            http: http_client(timeout)?,
            base_url,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/api/generate", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
    done: bool,
}

#[async_trait]
impl GenerationClient for OllamaGenerationClient {
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationClientError> {
        let payload = json!({
            "model": request.model,
            "prompt": request.prompt,
            "stream": false,
            "options": {
                "temperature": request.temperature,
            }
        });

        let endpoint = self.endpoint();
        let response = self
            .http
            .post(&endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|error| {
                GenerationClientError::ProviderUnavailable(format!(
                    "failed to reach Ollama at {}: {error}",
                    self.base_url
                ))
            })?;
        let response = check_status("Ollama", &endpoint, response).await?;

        let body: OllamaResponse = response.json().await.map_err(|error| {
            GenerationClientError::InvalidResponse(format!(
                "failed to decode Ollama response: {error}"
            ))
        })?;

        if !body.done {
            return Err(GenerationClientError::InvalidResponse(
                "Ollama response incomplete (streaming not supported)".into(),
            ));
        }

        non_empty(body.response)
    }
}

/// Client for the Gemini `generateContent` REST endpoint.
pub struct GeminiGenerationClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl GeminiGenerationClient {
    /// Construct a client targeting `base_url` authenticated with `api_key`.
    pub fn new(
        base_url: String,
        api_key: String,
        timeout: Duration,
    ) -> Result<Self, GenerationClientError> {
        Ok(Self {
            http: http_client(timeout)?,
            base_url,
            api_key,
        })
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/v1beta/models/{model}:generateContent",
            self.base_url.trim_end_matches('/')
        )
    }
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    text: Option<String>,
}

#[async_trait]
impl GenerationClient for GeminiGenerationClient {
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationClientError> {
        let payload = json!({
            "contents": [{ "role": "user", "parts": [{ "text": request.prompt }] }],
            "generationConfig": { "temperature": request.temperature },
        });

        let endpoint = self.endpoint(&request.model);
        let response = self
            .http
            .post(&endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&payload)
            .send()
            .await
            .map_err(|error| {
                GenerationClientError::ProviderUnavailable(format!(
                    "failed to reach Gemini: {error}"
                ))
            })?;
        let response = check_status("Gemini", &endpoint, response).await?;

        let body: GeminiResponse = response.json().await.map_err(|error| {
            GenerationClientError::InvalidResponse(format!(
                "failed to decode Gemini response: {error}"
            ))
        })?;

        let text = body
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        non_empty(text)
    }
}

fn non_empty(text: String) -> Result<String, GenerationClientError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(GenerationClientError::InvalidResponse(
            "provider returned an empty completion".into(),
        ));
    }
    Ok(trimmed.to_string())
}
