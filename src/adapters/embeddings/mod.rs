//! Embedding providers and the shared 2-D projection.

pub mod hashing;
pub mod openai;
pub mod projection;

pub use hashing::HashingEmbeddingProvider;
pub use openai::OpenAiEmbeddingProvider;

use std::sync::Arc;

use crate::domain::errors::DomainResult;
use crate::domain::models::{EmbeddingBackend, EmbeddingConfig, LlmConfig};
use crate::domain::ports::EmbeddingProvider;
use crate::services::retry::RetryPolicy;

/// Builds the provider selected in configuration.
pub fn build_provider(
    embedding: &EmbeddingConfig,
    llm: &LlmConfig,
    retry: RetryPolicy,
) -> DomainResult<Arc<dyn EmbeddingProvider>> {
    let provider: Arc<dyn EmbeddingProvider> = match embedding.provider {
        EmbeddingBackend::Hashing => Arc::new(HashingEmbeddingProvider::new(embedding.dimension)?),
        EmbeddingBackend::Openai => Arc::new(OpenAiEmbeddingProvider::new(embedding, llm, retry)?),
    };
    Ok(provider)
}
