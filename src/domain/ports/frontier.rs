//! Frontier port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};

/// Rejects priorities no frontier can order. Every adapter checks this on push.
pub fn check_priority(id: Uuid, priority: f64) -> DomainResult<()> {
    if priority.is_nan() {
        return Err(DomainError::ValidationFailed(format!("priority for {id} is NaN")));
    }
    Ok(())
}

/// Priority-ordered consumption queue over node ids.
///
/// Entries are removed on pop. Pushing the same id twice stores two entries.
/// A NaN priority is rejected with [`DomainError::ValidationFailed`].
/// Storage errors propagate; there is no retry at this layer.
#[async_trait]
pub trait Frontier: Send + Sync {
    async fn push(&self, id: Uuid, priority: f64) -> DomainResult<()>;

    /// Remove and return the highest-priority entry, or `None` when empty. Never blocks.
    async fn pop_max(&self) -> DomainResult<Option<Uuid>> {
        Ok(self.pop_batch(1).await?.into_iter().next())
    }

    /// Remove and return up to `n` entries in descending priority order.
    async fn pop_batch(&self, n: usize) -> DomainResult<Vec<Uuid>>;

    async fn size(&self) -> DomainResult<usize>;
}
