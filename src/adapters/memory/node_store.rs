//! In-memory NodeStore.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use super::lock;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::Node;
use crate::domain::ports::NodeStore;

/// Node store backed by a `HashMap`. Insertion order is kept for `get_all`.
#[derive(Default)]
pub struct InMemoryNodeStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    nodes: HashMap<Uuid, Node>,
    order: Vec<Uuid>,
}

impl InMemoryNodeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NodeStore for InMemoryNodeStore {
    async fn save(&self, node: &Node) -> DomainResult<()> {
        node.validate()?;

        let mut inner = lock(&self.inner);
        if inner.nodes.contains_key(&node.id) {
            return Err(DomainError::ValidationFailed(format!("node {} already exists", node.id)));
        }
        if let Some(parent_id) = node.parent_id {
            if !inner.nodes.contains_key(&parent_id) {
                return Err(DomainError::NodeNotFound(parent_id));
            }
        }
        inner.order.push(node.id);
        inner.nodes.insert(node.id, node.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Node>> {
        Ok(lock(&self.inner).nodes.get(&id).cloned())
    }

    async fn get_all(&self) -> DomainResult<Vec<Node>> {
        let inner = lock(&self.inner);
        Ok(inner.order.iter().filter_map(|id| inner.nodes.get(id).cloned()).collect())
    }

    async fn count(&self) -> DomainResult<usize> {
        Ok(lock(&self.inner).nodes.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Evaluation;

    fn evaluation(score: f64) -> Evaluation {
        Evaluation {
            score,
            samples: vec![],
            sample_count: 1,
            usage: None,
        }
    }

    #[tokio::test]
    async fn test_save_get_and_enumerate() {
        let store = InMemoryNodeStore::new();
        let root = Node::root("", vec![1.0], None);
        store.save(&root).await.unwrap();
        let child = Node::child(&root, "a", evaluation(0.4), vec![1.0], None);
        store.save(&child).await.unwrap();

        assert_eq!(store.get(child.id).await.unwrap().unwrap().depth, 1);
        let ids: Vec<Uuid> = store.get_all().await.unwrap().iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![root.id, child.id]);
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_rejects_duplicate_and_dangling_parent() {
        let store = InMemoryNodeStore::new();
        let root = Node::root("", vec![1.0], None);
        store.save(&root).await.unwrap();
        assert!(matches!(store.save(&root).await, Err(DomainError::ValidationFailed(_))));

        let stranger = Node::root("", vec![1.0], None);
        let orphan = Node::child(&stranger, "b", evaluation(0.4), vec![1.0], None);
        assert!(matches!(store.save(&orphan).await, Err(DomainError::NodeNotFound(_))));
    }

    #[tokio::test]
    async fn test_top_by_score_default_skips_unscored() {
        let store = InMemoryNodeStore::new();
        let root = Node::root("", vec![1.0], None);
        store.save(&root).await.unwrap();
        for score in [0.3, 0.8, 0.6] {
            store
                .save(&Node::child(&root, "c", evaluation(score), vec![1.0], None))
                .await
                .unwrap();
        }

        let top = store.top_by_score(10).await.unwrap();
        let scores: Vec<f64> = top.iter().filter_map(|n| n.score).collect();
        assert_eq!(scores, vec![0.8, 0.6, 0.3]);
    }
}
