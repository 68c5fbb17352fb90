//! OpenAI embedding provider adapter.
//!
//! Calls the `/embeddings` endpoint of any OpenAI-compatible API. Transient failures are
//! retried with the shared [`RetryPolicy`], and every returned vector is checked against
//! the configured dimension.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::adapters::embeddings::projection;
use crate::adapters::llm::client::{classify_status, classify_transport, resolve_api_key};
use crate::domain::errors::{DomainError, DomainResult, ServiceError, ServiceResult};
use crate::domain::models::{EmbeddingConfig, LlmConfig, Projection};
use crate::domain::ports::EmbeddingProvider;
use crate::services::retry::RetryPolicy;

/// OpenAI embedding provider.
pub struct OpenAiEmbeddingProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    dimension: usize,
    timeout: Duration,
    retry: RetryPolicy,
}

impl OpenAiEmbeddingProvider {
    pub fn new(embedding: &EmbeddingConfig, llm: &LlmConfig, retry: RetryPolicy) -> ServiceResult<Self> {
        let api_key = resolve_api_key(llm.api_key.as_deref())?;
        let timeout = Duration::from_secs(llm.request_timeout_secs);
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::Failed(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: llm.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: embedding.model.clone(),
            dimension: embedding.dimension,
            timeout,
            retry,
        })
    }

    async fn call_embeddings_api(&self, text: &str) -> ServiceResult<Vec<f32>> {
        let request_body = EmbeddingsRequest {
            model: &self.model,
            input: vec![text],
            dimensions: self.dimension,
        };

        let response = self
            .http
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| classify_transport(&e, self.timeout))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read response body".to_string());
            return Err(classify_status(status, &body));
        }

        let result: EmbeddingsResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::MalformedResponse(format!("embedding response: {e}")))?;

        result
            .data
            .into_iter()
            .min_by_key(|d| d.index)
            .map(|d| d.embedding)
            .ok_or_else(|| ServiceError::MalformedResponse("empty embedding response".to_string()))
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> DomainResult<Vec<f32>> {
        let embedding = self
            .retry
            .execute("embedding", || self.call_embeddings_api(text))
            .await?;

        if embedding.len() != self.dimension {
            return Err(DomainError::Service(ServiceError::MalformedResponse(format!(
                "expected embedding dimension {}, got {}",
                self.dimension,
                embedding.len()
            ))));
        }
        debug!(model = %self.model, dimension = embedding.len(), "Embedded text");
        Ok(embedding)
    }

    fn project(&self, vector: &[f32]) -> Projection {
        projection::project(vector)
    }
}

// -- OpenAI API request/response types --

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
    dimensions: usize,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}
