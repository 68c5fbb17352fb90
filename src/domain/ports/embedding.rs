//! Embedding provider port for strategy vectorization.
//!
//! Converts strategy text into fixed-length vectors used for novelty comparison,
//! and reduces those vectors to 2-D coordinates for visualization.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::Projection;

/// Trait for embedding providers.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Provider name (e.g., "openai", "hashing").
    fn name(&self) -> &'static str;

    /// Length of every vector this provider returns.
    fn dimension(&self) -> usize;

    /// Generate an embedding for a single text.
    async fn embed(&self, text: &str) -> DomainResult<Vec<f32>>;

    /// Reduce a vector to 2-D coordinates. Must be deterministic.
    fn project(&self, vector: &[f32]) -> Projection;
}
