//! In-memory Frontier.

use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use super::lock;
use crate::domain::errors::DomainResult;
use crate::domain::models::PriorityQueue;
use crate::domain::ports::{check_priority, Frontier};

/// Binary-heap frontier. Ties pop in insertion order.
#[derive(Default)]
pub struct InMemoryFrontier {
    queue: Mutex<PriorityQueue<Uuid>>,
}

impl InMemoryFrontier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn peek_priority(&self) -> Option<f64> {
        lock(&self.queue).peek_priority()
    }
}

#[async_trait]
impl Frontier for InMemoryFrontier {
    async fn push(&self, id: Uuid, priority: f64) -> DomainResult<()> {
        check_priority(id, priority)?;
        lock(&self.queue).push(id, priority);
        Ok(())
    }

    async fn pop_max(&self) -> DomainResult<Option<Uuid>> {
        Ok(lock(&self.queue).pop())
    }

    async fn pop_batch(&self, n: usize) -> DomainResult<Vec<Uuid>> {
        Ok(lock(&self.queue).pop_many(n))
    }

    async fn size(&self) -> DomainResult<usize> {
        Ok(lock(&self.queue).len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::DomainError;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_pop_order_and_empty() {
        let frontier = InMemoryFrontier::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        frontier.push(a, 0.2).await.unwrap();
        frontier.push(b, 0.4).await.unwrap();

        assert_eq!(frontier.size().await.unwrap(), 2);
        assert_eq!(frontier.pop_max().await.unwrap(), Some(b));
        assert_eq!(frontier.pop_batch(5).await.unwrap(), vec![a]);
        assert_eq!(frontier.pop_max().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_nan_priority_rejected() {
        let frontier = InMemoryFrontier::new();
        let result = frontier.push(Uuid::new_v4(), f64::NAN).await;
        assert!(matches!(result, Err(DomainError::ValidationFailed(_))));
        assert_eq!(frontier.size().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_consumers_never_share_entries() {
        let frontier = Arc::new(InMemoryFrontier::new());
        for i in 0..100 {
            frontier.push(Uuid::new_v4(), f64::from(i)).await.unwrap();
        }

        let mut handles = Vec::new();
        for _ in 0..4 {
            let frontier = Arc::clone(&frontier);
            handles.push(tokio::spawn(async move { frontier.pop_batch(30).await.unwrap() }));
        }

        let mut seen = std::collections::HashSet::new();
        let mut total = 0;
        for handle in handles {
            for id in handle.await.unwrap() {
                total += 1;
                assert!(seen.insert(id));
            }
        }
        assert_eq!(total, 100);
        assert_eq!(frontier.size().await.unwrap(), 0);
    }
}
