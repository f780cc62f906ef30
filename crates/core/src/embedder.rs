use crate::error::EmbedError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Maps text to a fixed-length vector. Each call is independent and
/// side-effect-free from the pipeline's perspective.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn dimensions(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError>;
}

/// Client for OpenAI-compatible `/embeddings` endpoints.
pub struct OpenAiEmbedder {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    dimensions: usize,
}

impl OpenAiEmbedder {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        dimensions: usize,
    ) -> Self {
        let base_url = base_url.into();
        Self {
            client: Client::new(),
            endpoint: format!("{}/embeddings", base_url.trim_end_matches('/')),
            api_key: api_key.into(),
            model: model.into(),
            dimensions,
        }
    }

    async fn request_embeddings(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let body = EmbeddingRequest {
            model: &self.model,
            input: inputs,
            dimensions: self.dimensions,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|error| {
                if error.is_timeout() {
                    EmbedError::Timeout
                } else {
                    EmbedError::Http(error)
                }
            })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(EmbedError::RateLimited);
        }
        if status.is_server_error() {
            return Err(EmbedError::BackendResponse {
                backend: "openai".to_string(),
                details: status.to_string(),
            });
        }
        if !status.is_success() {
            let details = response.text().await.unwrap_or_else(|_| status.to_string());
            return Err(EmbedError::InvalidInput(details));
        }

        let parsed: EmbeddingResponse = response.json().await?;
        vectors_from_response(parsed, inputs.len())
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let mut vectors = self.request_embeddings(&[text]).await?;
        vectors.pop().ok_or_else(|| EmbedError::BackendResponse {
            backend: "openai".to_string(),
            details: "response carried no embedding".to_string(),
        })
    }
}

/// Re-order provider output by its declared `index` and demand one vector
/// per input. Results must be re-associated by identity, never by
/// arrival order.
fn vectors_from_response(
    mut parsed: EmbeddingResponse,
    expected: usize,
) -> Result<Vec<Vec<f32>>, EmbedError> {
    parsed.data.sort_by_key(|entry| entry.index);

    if parsed.data.len() != expected {
        return Err(EmbedError::BackendResponse {
            backend: "openai".to_string(),
            details: format!(
                "returned {} embeddings for {} inputs",
                parsed.data.len(),
                expected
            ),
        });
    }

    Ok(parsed.data.into_iter().map(|entry| entry.embedding).collect())
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
    dimensions: usize,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}
