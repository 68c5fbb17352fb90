use std::sync::Arc;

use crate::domain::models::{Node, SchedulerWeights};
use crate::domain::ports::WeightsProvider;

/// Cosine similarity of two vectors.
///
/// Returns `None` when the lengths differ or either vector has zero norm, so callers never
/// divide by zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }

    let (dot, norm_a, norm_b) = a.iter().zip(b).fold((0.0_f64, 0.0_f64, 0.0_f64), |(dot, na, nb), (x, y)| {
        let (x, y) = (f64::from(*x), f64::from(*y));
        (dot + x * y, na + x * x, nb + y * y)
    });

    if norm_a <= f64::EPSILON || norm_b <= f64::EPSILON {
        return None;
    }
    Some((dot / (norm_a.sqrt() * norm_b.sqrt())) as f32)
}

/// Highest cosine similarity between `embedding` and any comparable vector of `top_k`.
///
/// 0 when `top_k` is empty or holds nothing comparable.
pub fn max_cosine_similarity(embedding: &[f32], top_k: &[Vec<f32>]) -> f64 {
    top_k
        .iter()
        .filter_map(|other| cosine_similarity(embedding, other))
        .map(f64::from)
        .reduce(f64::max)
        .unwrap_or(0.0)
}

/// Frontier priority of a freshly evaluated child.
///
/// Priority formula:
/// `score + λ_trend * (score - parent_score) + λ_sim * (1 - max_cos) - λ_depth * depth`
///
/// # Arguments
/// * `score` - The child's score; an unscored child counts as 0
/// * `parent_score` - The parent's score; `None` gives no trend bonus
/// * `top_k` - Embeddings of the current best nodes, shared by every child of a batch
pub fn compute_priority(
    score: Option<f64>,
    parent_score: Option<f64>,
    embedding: &[f32],
    depth: u32,
    top_k: &[Vec<f32>],
    weights: &SchedulerWeights,
) -> f64 {
    let score = score.unwrap_or(0.0);
    let trend_bonus = parent_score.map_or(0.0, |parent| weights.lambda_trend * (score - parent));
    let novelty_bonus = weights.lambda_sim * (1.0 - max_cosine_similarity(embedding, top_k));
    let depth_penalty = weights.lambda_depth * f64::from(depth);

    score + trend_bonus + novelty_bonus - depth_penalty
}

/// Service for calculating frontier priorities
///
/// Weights are read from the provider on every call, so runtime changes apply to the next
/// child without affecting entries already queued.
#[derive(Clone)]
pub struct PriorityCalculator {
    weights: Arc<dyn WeightsProvider>,
}

impl PriorityCalculator {
    pub fn new(weights: Arc<dyn WeightsProvider>) -> Self {
        Self { weights }
    }

    /// Calculator with fixed weights.
    pub fn with_weights(weights: SchedulerWeights) -> Self {
        Self::new(Arc::new(weights))
    }

    pub fn current_weights(&self) -> SchedulerWeights {
        self.weights.weights()
    }

    /// Calculate the priority for a child node
    pub fn calculate(&self, child: &Node, parent_score: Option<f64>, top_k: &[Vec<f32>]) -> f64 {
        compute_priority(
            child.score,
            parent_score,
            &child.embedding,
            child.depth,
            top_k,
            &self.weights.weights(),
        )
    }
}

impl std::fmt::Debug for PriorityCalculator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriorityCalculator")
            .field("weights", &self.weights.weights())
            .finish()
    }
}
