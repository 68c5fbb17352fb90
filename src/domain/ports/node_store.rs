//! Node store port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::Node;

/// Durable storage for node records, keyed by id.
///
/// Implementations must be safe for concurrent callers and must reject saving an id
/// that already exists: nodes are write-once.
#[async_trait]
pub trait NodeStore: Send + Sync {
    /// Persist a new node. Fails with a validation error if the id is already stored.
    async fn save(&self, node: &Node) -> DomainResult<()>;

    /// Get a node by id.
    async fn get(&self, id: Uuid) -> DomainResult<Option<Node>>;

    /// Enumerate every stored node.
    async fn get_all(&self) -> DomainResult<Vec<Node>>;

    /// The `k` highest-scoring evaluated nodes, best first.
    async fn top_by_score(&self, k: usize) -> DomainResult<Vec<Node>> {
        let mut nodes: Vec<Node> = self.get_all().await?.into_iter().filter(|n| n.score.is_some()).collect();
        nodes.sort_by(|a, b| b.score.unwrap_or(0.0).total_cmp(&a.score.unwrap_or(0.0)));
        nodes.truncate(k);
        Ok(nodes)
    }

    async fn count(&self) -> DomainResult<usize> {
        Ok(self.get_all().await?.len())
    }
}
