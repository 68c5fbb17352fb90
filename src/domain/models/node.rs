//! Node domain model.
//!
//! A node is one candidate strategy plus its evaluation record at a fixed depth of the
//! search forest. Nodes are written once and never mutated afterwards; re-scoring a
//! strategy produces a new node.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};

/// Who produced a turn of a simulated conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The agent speaking under the candidate strategy.
    Agent,
    /// The simulated counterpart.
    Persona,
}

/// A single turn of a simulated conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn agent(content: impl Into<String>) -> Self {
        Self {
            role: Role::Agent,
            content: content.into(),
        }
    }

    pub fn persona(content: impl Into<String>) -> Self {
        Self {
            role: Role::Persona,
            content: content.into(),
        }
    }
}

/// Why a simulated conversation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Recent turns stopped improving.
    Plateau,
    /// The latest score crossed the success threshold.
    EarlySuccess,
    /// The scenario's hard turn limit was reached.
    MaxTurns,
    /// A collaborator failed mid-conversation; the last observed score was kept.
    Aborted,
}

/// One simulated conversation run against a strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSample {
    pub scenario: String,
    pub turns: Vec<Turn>,
    /// Critic score after each persona reply, in order.
    pub turn_scores: Vec<f64>,
    pub score: f64,
    pub stop_reason: StopReason,
}

impl ConversationSample {
    /// Number of agent/persona exchanges that were scored.
    pub fn scored_turns(&self) -> usize {
        self.turn_scores.len()
    }
}

/// 2-D coordinates used only for visualization.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    pub x: f32,
    pub y: f32,
}

/// Token and cost accounting attached to an evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub cost_usd: f64,
}

impl Usage {
    pub fn add(&mut self, other: &Self) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.cost_usd += other.cost_usd;
    }
}

/// A collaborator result together with what it cost.
#[derive(Debug, Clone, PartialEq)]
pub struct Metered<T> {
    pub value: T,
    pub usage: Usage,
}

impl<T> Metered<T> {
    pub const fn new(value: T, usage: Usage) -> Self {
        Self { value, usage }
    }

    /// A result that consumed no priced calls.
    pub fn free(value: T) -> Self {
        Self {
            value,
            usage: Usage::default(),
        }
    }
}

/// Result of `Evaluate(strategy)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub score: f64,
    pub samples: Vec<ConversationSample>,
    pub sample_count: u32,
    pub usage: Option<Usage>,
}

/// Aggregate performance handed to the variant generator.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PerformanceSummary {
    #[serde(default)]
    pub avg_score: f64,
    #[serde(default)]
    pub sample_count: u32,
}

impl PerformanceSummary {
    pub fn of(node: &Node) -> Self {
        Self {
            avg_score: node.score.unwrap_or(0.0),
            sample_count: node.sample_count,
        }
    }
}

/// Lightweight change notification published after a child is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphUpdate {
    pub id: Uuid,
    pub projection: Option<Projection>,
    pub score: Option<f64>,
    pub parent_id: Option<Uuid>,
}

impl From<&Node> for GraphUpdate {
    fn from(node: &Node) -> Self {
        Self {
            id: node.id,
            projection: node.projection,
            score: node.score,
            parent_id: node.parent_id,
        }
    }
}

/// A candidate strategy and its evaluation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: Uuid,
    pub strategy: String,
    pub samples: Vec<ConversationSample>,
    pub score: Option<f64>,
    pub sample_count: u32,
    pub depth: u32,
    pub parent_id: Option<Uuid>,
    pub embedding: Vec<f32>,
    pub projection: Option<Projection>,
    pub usage: Option<Usage>,
    pub created_at: DateTime<Utc>,
}

impl Node {
    /// Creates an unevaluated root node.
    pub fn root(strategy: impl Into<String>, embedding: Vec<f32>, projection: Option<Projection>) -> Self {
        Self {
            id: Uuid::new_v4(),
            strategy: strategy.into(),
            samples: Vec::new(),
            score: None,
            sample_count: 0,
            depth: 0,
            parent_id: None,
            embedding,
            projection,
            usage: None,
            created_at: Utc::now(),
        }
    }

    /// Creates an evaluated child one generation below `parent`.
    pub fn child(
        parent: &Self,
        strategy: impl Into<String>,
        evaluation: Evaluation,
        embedding: Vec<f32>,
        projection: Option<Projection>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            strategy: strategy.into(),
            samples: evaluation.samples,
            score: Some(evaluation.score),
            sample_count: evaluation.sample_count,
            depth: parent.depth + 1,
            parent_id: Some(parent.id),
            embedding,
            projection,
            usage: evaluation.usage,
            created_at: Utc::now(),
        }
    }

    /// Sets score and sample count together.
    #[must_use]
    pub fn with_score(mut self, score: f64, sample_count: u32) -> Self {
        self.score = Some(score);
        self.sample_count = sample_count;
        self
    }

    pub const fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Checks the record-level invariants enforced on every save.
    pub fn validate(&self) -> DomainResult<()> {
        match self.score {
            None if self.sample_count != 0 => {
                return Err(DomainError::ValidationFailed(format!(
                    "node {} has sample_count {} but no score",
                    self.id, self.sample_count
                )));
            }
            Some(_) if self.sample_count == 0 => {
                return Err(DomainError::ValidationFailed(format!(
                    "node {} has a score but sample_count 0",
                    self.id
                )));
            }
            Some(score) if !(0.0..=1.0).contains(&score) => {
                return Err(DomainError::ValidationFailed(format!(
                    "node {} score {score} outside [0, 1]",
                    self.id
                )));
            }
            _ => {}
        }

        match (self.parent_id, self.depth) {
            (None, d) if d != 0 => {
                return Err(DomainError::ValidationFailed(format!(
                    "root node {} must have depth 0, got {d}",
                    self.id
                )));
            }
            (Some(_), 0) => {
                return Err(DomainError::ValidationFailed(format!(
                    "child node {} must have depth >= 1",
                    self.id
                )));
            }
            (Some(parent), _) if parent == self.id => {
                return Err(DomainError::ValidationFailed(format!("node {} is its own parent", self.id)));
            }
            _ => {}
        }

        if !self.is_root() && self.strategy.trim().is_empty() {
            return Err(DomainError::ValidationFailed(format!(
                "child node {} has an empty strategy",
                self.id
            )));
        }

        if self.embedding.is_empty() || self.embedding.iter().any(|v| !v.is_finite()) {
            return Err(DomainError::ValidationFailed(format!(
                "node {} has an empty or non-finite embedding",
                self.id
            )));
        }

        Ok(())
    }

    /// First `max_chars` characters of the strategy, for tables and logs.
    pub fn preview(&self, max_chars: usize) -> String {
        let mut chars = self.strategy.chars();
        let head: String = chars.by_ref().take(max_chars).collect();
        if chars.next().is_some() {
            format!("{head}...")
        } else {
            head
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evaluation(score: f64) -> Evaluation {
        Evaluation {
            score,
            samples: vec![],
            sample_count: 3,
            usage: None,
        }
    }

    #[test]
    fn test_root_is_valid_and_unscored() {
        let root = Node::root("", vec![1.0, 0.0], None);
        assert!(root.is_root());
        assert_eq!(root.depth, 0);
        assert_eq!(root.score, None);
        assert_eq!(root.sample_count, 0);
        assert!(root.validate().is_ok());
    }

    #[test]
    fn test_child_links_to_parent() {
        let root = Node::root("be concise", vec![1.0, 0.0], None).with_score(0.5, 1);
        let child = Node::child(&root, "be concise and warm", evaluation(0.6), vec![0.0, 1.0], None);

        assert_eq!(child.depth, 1);
        assert_eq!(child.parent_id, Some(root.id));
        assert_eq!(child.score, Some(0.6));
        assert_eq!(child.sample_count, 3);
        assert!(child.validate().is_ok());

        let grandchild = Node::child(&child, "shorter", evaluation(0.7), vec![0.5, 0.5], None);
        assert_eq!(grandchild.depth, 2);
    }

    #[test]
    fn test_validate_rejects_inconsistent_score() {
        let mut node = Node::root("x", vec![1.0], None);
        node.sample_count = 2;
        assert!(matches!(node.validate(), Err(DomainError::ValidationFailed(_))));

        let node = Node::root("x", vec![1.0], None).with_score(0.4, 0);
        assert!(node.validate().is_err());

        let node = Node::root("x", vec![1.0], None).with_score(1.2, 1);
        assert!(node.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_depth_mismatch() {
        let mut node = Node::root("x", vec![1.0], None);
        node.depth = 2;
        assert!(node.validate().is_err());

        let root = Node::root("x", vec![1.0], None);
        let mut child = Node::child(&root, "y", evaluation(0.5), vec![1.0], None);
        child.depth = 0;
        assert!(child.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_child_strategy_and_embedding() {
        let root = Node::root("x", vec![1.0], None);
        let child = Node::child(&root, "   ", evaluation(0.5), vec![1.0], None);
        assert!(child.validate().is_err());

        let root = Node::root("x", vec![], None);
        assert!(root.validate().is_err());
    }

    #[test]
    fn test_preview_truncates() {
        let node = Node::root("abcdefghij", vec![1.0], None);
        assert_eq!(node.preview(4), "abcd...");
        assert_eq!(node.preview(20), "abcdefghij");
    }

    #[test]
    fn test_performance_summary_defaults_for_unscored() {
        let node = Node::root("", vec![1.0], None);
        let summary = PerformanceSummary::of(&node);
        assert_eq!(summary.avg_score, 0.0);
        assert_eq!(summary.sample_count, 0);
    }
}
