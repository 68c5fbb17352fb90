//! Creation of root nodes.

use std::sync::Arc;

use tracing::info;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::Node;
use crate::domain::ports::{EmbeddingProvider, Frontier, NodeStore};

/// Frontier priority given to unscored roots so they are expanded first.
pub const UNSCORED_ROOT_PRIORITY: f64 = 1.0;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeedRequest {
    pub strategies: Vec<String>,
    /// Additional roots with an empty strategy.
    pub empty: usize,
    /// Initial score for every root, recorded with a sample count of 1.
    pub score: Option<f64>,
}

impl SeedRequest {
    pub fn root_count(&self) -> usize {
        self.strategies.len() + self.empty
    }
}

pub struct Seeder {
    store: Arc<dyn NodeStore>,
    frontier: Arc<dyn Frontier>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl Seeder {
    pub fn new(store: Arc<dyn NodeStore>, frontier: Arc<dyn Frontier>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            store,
            frontier,
            embedder,
        }
    }

    /// Writes each root, then enqueues it.
    pub async fn seed(&self, request: &SeedRequest) -> DomainResult<Vec<Node>> {
        if request.root_count() == 0 {
            return Err(DomainError::ValidationFailed("nothing to seed".to_string()));
        }
        if let Some(score) = request.score {
            if !(0.0..=1.0).contains(&score) {
                return Err(DomainError::ValidationFailed(format!("seed score {score} outside [0, 1]")));
            }
        }

        let strategies = request
            .strategies
            .iter()
            .cloned()
            .chain(std::iter::repeat(String::new()).take(request.empty));

        let mut roots = Vec::with_capacity(request.root_count());
        for strategy in strategies {
            let embedding = self.embedder.embed(&strategy).await?;
            let projection = self.embedder.project(&embedding);
            let mut root = Node::root(strategy, embedding, Some(projection));
            if let Some(score) = request.score {
                root = root.with_score(score, 1);
            }

            let priority = request.score.unwrap_or(UNSCORED_ROOT_PRIORITY);
            self.store.save(&root).await?;
            self.frontier.push(root.id, priority).await?;
            info!(node_id = %root.id, priority, strategy = %root.preview(60), "Root seeded");
            roots.push(root);
        }

        Ok(roots)
    }
}
