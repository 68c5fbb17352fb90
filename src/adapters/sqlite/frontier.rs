//! SQLite implementation of the Frontier.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::adapters::sqlite::parse_uuid;
use crate::domain::errors::DomainResult;
use crate::domain::ports::{check_priority, Frontier};

pub struct SqliteFrontier {
    pool: SqlitePool,
}

impl SqliteFrontier {
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Highest queued priority, if any.
    pub async fn peek_priority(&self) -> DomainResult<Option<f64>> {
        let row: Option<(f64,)> = sqlx::query_as("SELECT priority FROM frontier ORDER BY priority DESC, seq ASC LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(p,)| p))
    }
}

#[async_trait]
impl Frontier for SqliteFrontier {
    async fn push(&self, id: Uuid, priority: f64) -> DomainResult<()> {
        check_priority(id, priority)?;

        sqlx::query("INSERT INTO frontier (node_id, priority) VALUES (?, ?)")
            .bind(id.to_string())
            .bind(priority)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn pop_batch(&self, n: usize) -> DomainResult<Vec<Uuid>> {
        if n == 0 {
            return Ok(Vec::new());
        }

        // One statement, so concurrent consumers never receive the same entry.
        let mut rows: Vec<(i64, String, f64)> = sqlx::query_as(
            r"DELETE FROM frontier
               WHERE seq IN (SELECT seq FROM frontier ORDER BY priority DESC, seq ASC LIMIT ?)
               RETURNING seq, node_id, priority",
        )
        .bind(n as i64)
        .fetch_all(&self.pool)
        .await?;

        // RETURNING order is unspecified.
        rows.sort_by(|a, b| b.2.total_cmp(&a.2).then_with(|| a.0.cmp(&b.0)));
        rows.into_iter().map(|(_, id, _)| parse_uuid(&id)).collect()
    }

    async fn size(&self) -> DomainResult<usize> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM frontier").fetch_one(&self.pool).await?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{all_embedded_migrations, create_test_pool, Migrator};

    async fn setup_test_frontier() -> SqliteFrontier {
        let pool = create_test_pool().await.unwrap();
        let migrator = Migrator::new(pool.clone());
        migrator.run_embedded_migrations(all_embedded_migrations()).await.unwrap();
        SqliteFrontier::new(pool)
    }

    #[tokio::test]
    async fn test_pop_max_returns_highest() {
        let frontier = setup_test_frontier().await;
        let low = Uuid::new_v4();
        let high = Uuid::new_v4();
        frontier.push(low, 0.1).await.unwrap();
        frontier.push(high, 0.8).await.unwrap();

        assert_eq!(frontier.peek_priority().await.unwrap(), Some(0.8));
        assert_eq!(frontier.pop_max().await.unwrap(), Some(high));
        assert_eq!(frontier.pop_max().await.unwrap(), Some(low));
        assert_eq!(frontier.pop_max().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_pop_batch_orders_and_breaks_ties_by_insertion() {
        let frontier = setup_test_frontier().await;
        let ids: Vec<Uuid> = (0..5).map(|_| Uuid::new_v4()).collect();
        frontier.push(ids[0], 0.5).await.unwrap();
        frontier.push(ids[1], 0.9).await.unwrap();
        frontier.push(ids[2], 0.5).await.unwrap();
        frontier.push(ids[3], -0.3).await.unwrap();
        frontier.push(ids[4], 0.7).await.unwrap();

        let popped = frontier.pop_batch(4).await.unwrap();
        assert_eq!(popped, vec![ids[1], ids[4], ids[0], ids[2]]);
        assert_eq!(frontier.size().await.unwrap(), 1);

        let rest = frontier.pop_batch(10).await.unwrap();
        assert_eq!(rest, vec![ids[3]]);
        assert!(frontier.pop_batch(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicates_are_kept() {
        let frontier = setup_test_frontier().await;
        let id = Uuid::new_v4();
        frontier.push(id, 0.5).await.unwrap();
        frontier.push(id, 0.5).await.unwrap();
        assert_eq!(frontier.size().await.unwrap(), 2);
        assert_eq!(frontier.pop_batch(5).await.unwrap(), vec![id, id]);
    }

    #[tokio::test]
    async fn test_nan_priority_rejected() {
        let frontier = setup_test_frontier().await;
        assert!(frontier.push(Uuid::new_v4(), f64::NAN).await.is_err());
        assert_eq!(frontier.size().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_pop_zero_is_noop() {
        let frontier = setup_test_frontier().await;
        frontier.push(Uuid::new_v4(), 1.0).await.unwrap();
        assert!(frontier.pop_batch(0).await.unwrap().is_empty());
        assert_eq!(frontier.size().await.unwrap(), 1);
    }
}
