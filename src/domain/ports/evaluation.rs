//! Ports for the evaluation collaborators.
//!
//! The worker only sees [`VariantGenerator`] and [`Evaluator`]. The remaining traits are
//! the sub-services the conversation evaluator is assembled from.

use async_trait::async_trait;

use crate::domain::errors::ServiceResult;
use crate::domain::models::{Evaluation, Metered, PerformanceSummary, ScenarioConfig, Turn};

/// Produces mutated child strategies from a parent.
#[async_trait]
pub trait VariantGenerator: Send + Sync {
    /// Returns exactly `k` non-empty strategies or fails the whole call.
    async fn generate_variants(
        &self,
        parent_strategy: &str,
        performance: &PerformanceSummary,
        k: usize,
    ) -> ServiceResult<Vec<String>>;
}

/// Fitness function over strategies.
///
/// Must be safely callable concurrently for different strategies.
#[async_trait]
pub trait Evaluator: Send + Sync {
    async fn evaluate(&self, strategy: &str) -> ServiceResult<Evaluation>;
}

/// Speaks for the agent under a candidate strategy.
#[async_trait]
pub trait TurnGenerator: Send + Sync {
    /// Next agent message given the transcript so far (empty for the opening).
    async fn next_message(&self, strategy: &str, transcript: &[Turn]) -> ServiceResult<Metered<String>>;
}

/// Simulated counterpart of the conversation.
#[async_trait]
pub trait Responder: Send + Sync {
    async fn respond(&self, scenario: &ScenarioConfig, transcript: &[Turn]) -> ServiceResult<Metered<String>>;
}

/// Judges a transcript. Scores are in `[0, 1]`.
#[async_trait]
pub trait Critic: Send + Sync {
    async fn score(&self, transcript: &[Turn]) -> ServiceResult<Metered<f64>>;
}
