//! HTTP embedding adapters for Ollama and OpenAI-compatible endpoints.
//!
//! Both adapters share one retry loop: 429, 5xx, and transport errors are retried with
//! exponential backoff; other 4xx responses fail immediately.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::json;

use super::{EmbeddingClient, EmbeddingClientError};

/// Backoff settings for transient provider failures.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Additional attempts after the first request.
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each further attempt.
    pub base_delay: Duration,
}

impl RetryPolicy {
    fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * (1_u32 << (attempt - 1).min(5))
    }
}

fn http_client(timeout: Duration) -> Result<Client, EmbeddingClientError> {
    Client::builder()
        .user_agent("docqa/embedding")
        .timeout(timeout)
        .build()
        .map_err(|error| EmbeddingClientError::Configuration(error.to_string()))
}

async fn send_with_retry<F>(
    provider: &str,
    retry: RetryPolicy,
    build: F,
) -> Result<reqwest::Response, EmbeddingClientError>
where
    F: Fn() -> RequestBuilder,
{
    let mut last_error = None;

    for attempt in 0..=retry.max_retries {
        if attempt > 0 {
            let delay = retry.delay_for(attempt);
            tracing::debug!(provider, attempt, delay_ms = delay.as_millis() as u64, "Retrying embedding request");
            tokio::time::sleep(delay).await;
        }

        match build().send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    return Ok(response);
                }

                let body = response.text().await.unwrap_or_default();
                let message = format!("{provider} returned {status}: {body}");
                if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                    tracing::warn!(provider, %status, attempt, "Transient embedding failure");
                    last_error = Some(message);
                    continue;
                }
                return Err(EmbeddingClientError::GenerationFailed(message));
            }
            Err(error) => {
                tracing::warn!(provider, attempt, %error, "Embedding request failed");
                last_error = Some(format!("failed to reach {provider}: {error}"));
            }
        }
    }

    Err(EmbeddingClientError::GenerationFailed(last_error.unwrap_or_else(
        || format!("{provider} embedding failed after retries"),
    )))
}

fn ensure_count(
    vectors: Vec<Vec<f32>>,
    expected: usize,
) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
    if vectors.len() != expected {
        return Err(EmbeddingClientError::InvalidResponse(format!(
            "expected {expected} embeddings, received {}",
            vectors.len()
        )));
    }
    Ok(vectors)
}

/// Embedding client for a local Ollama runtime (`POST /api/embed`).
pub struct OllamaEmbeddingClient {
    http: Client,
    base_url: String,
    model: String,
    retry: RetryPolicy,
}

#[derive(Debug, Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl OllamaEmbeddingClient {
    /// Construct a client targeting `base_url`.
    pub fn new(
        base_url: String,
        model: String,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self, EmbeddingClientError> {
        Ok(Self {
            http: http_client(timeout)?,
            base_url,
            model,
            retry,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/api/embed", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl EmbeddingClient for OllamaEmbeddingClient {
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let expected = texts.len();
        let payload = json!({ "model": self.model, "input": texts });
        let endpoint = self.endpoint();

        let response = send_with_retry("ollama", self.retry, || {
            self.http.post(&endpoint).json(&payload)
        })
        .await?;

        let body: OllamaEmbedResponse = response.json().await.map_err(|error| {
            EmbeddingClientError::InvalidResponse(format!(
                "failed to decode Ollama response: {error}"
            ))
        })?;
        ensure_count(body.embeddings, expected)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Embedding client for OpenAI-compatible APIs (`POST /v1/embeddings`).
pub struct OpenAiEmbeddingClient {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
    retry: RetryPolicy,
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbedResponse {
    data: Vec<OpenAiEmbedding>,
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbedding {
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAiEmbeddingClient {
    /// Construct a client targeting `base_url` with a bearer `api_key`.
    pub fn new(
        base_url: String,
        api_key: String,
        model: String,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self, EmbeddingClientError> {
        Ok(Self {
            http: http_client(timeout)?,
            base_url,
            api_key,
            model,
            retry,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/embeddings", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl EmbeddingClient for OpenAiEmbeddingClient {
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let expected = texts.len();
        let payload = json!({ "model": self.model, "input": texts });
        let endpoint = self.endpoint();

        let response = send_with_retry("openai", self.retry, || {
            self.http
                .post(&endpoint)
                .bearer_auth(&self.api_key)
                .json(&payload)
        })
        .await?;

        let mut body: OpenAiEmbedResponse = response.json().await.map_err(|error| {
            EmbeddingClientError::InvalidResponse(format!(
                "failed to decode OpenAI response: {error}"
            ))
        })?;
        body.data.sort_by_key(|item| item.index);
        ensure_count(
            body.data.into_iter().map(|item| item.embedding).collect(),
            expected,
        )
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};

    fn no_wait(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn ollama_client_returns_vectors_in_order() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/embed")
                    .json_body(json!({ "model": "nomic", "input": ["a", "b"] }));
                then.status(200)
                    .json_body(json!({ "embeddings": [[1.0, 0.0], [0.0, 1.0]] }));
            })
            .await;

        let client = OllamaEmbeddingClient::new(
            server.base_url(),
            "nomic".into(),
            Duration::from_secs(5),
            no_wait(0),
        )
        .expect("client");
        let vectors = client
            .generate_embeddings(vec!["a".into(), "b".into()])
            .await
            .expect("vectors");

        mock.assert_async().await;
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[tokio::test]
    async fn ollama_client_retries_server_errors_until_budget_is_spent() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/api/embed");
                then.status(503).body("overloaded");
            })
            .await;

        let client = OllamaEmbeddingClient::new(
            server.base_url(),
            "nomic".into(),
            Duration::from_secs(5),
            no_wait(2),
        )
        .expect("client");
        let err = client
            .generate_embeddings(vec!["a".into()])
            .await
            .unwrap_err();

        mock.assert_hits_async(3).await;
        assert!(matches!(err, EmbeddingClientError::GenerationFailed(msg) if msg.contains("503")));
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/embeddings");
                then.status(401).body("bad key");
            })
            .await;

        let client = OpenAiEmbeddingClient::new(
            server.base_url(),
            "sk-test".into(),
            "text-embedding-3-small".into(),
            Duration::from_secs(5),
            no_wait(3),
        )
        .expect("client");
        let err = client
            .generate_embeddings(vec!["a".into()])
            .await
            .unwrap_err();

        mock.assert_hits_async(1).await;
        assert!(matches!(err, EmbeddingClientError::GenerationFailed(_)));
    }

    #[tokio::test]
    async fn openai_client_reorders_by_index_and_sends_bearer_token() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/embeddings")
                    .header("authorization", "Bearer sk-test");
                then.status(200).json_body(json!({
                    "data": [
                        { "index": 1, "embedding": [0.0, 1.0] },
                        { "index": 0, "embedding": [1.0, 0.0] }
                    ]
                }));
            })
            .await;

        let client = OpenAiEmbeddingClient::new(
            server.base_url(),
            "sk-test".into(),
            "text-embedding-3-small".into(),
            Duration::from_secs(5),
            no_wait(0),
        )
        .expect("client");
        let vectors = client
            .generate_embeddings(vec!["first".into(), "second".into()])
            .await
            .expect("vectors");

        mock.assert_async().await;
        assert_eq!(vectors[0], vec![1.0, 0.0]);
        assert_eq!(vectors[1], vec![0.0, 1.0]);
    }

    #[tokio::test]
    async fn count_mismatch_is_reported() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/embed");
                then.status(200).json_body(json!({ "embeddings": [[1.0]] }));
            })
            .await;

        let client = OllamaEmbeddingClient::new(
            server.base_url(),
            "nomic".into(),
            Duration::from_secs(5),
            no_wait(0),
        )
        .expect("client");
        let err = client
            .generate_embeddings(vec!["a".into(), "b".into()])
            .await
            .unwrap_err();
        assert!(matches!(err, EmbeddingClientError::InvalidResponse(_)));
    }
}
