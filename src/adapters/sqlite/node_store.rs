//! SQLite implementation of the NodeStore.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::adapters::sqlite::{parse_datetime, parse_optional_uuid, parse_uuid};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Node, Projection, Usage};
use crate::domain::ports::NodeStore;

pub struct SqliteNodeStore {
    pool: SqlitePool,
}

impl SqliteNodeStore {
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NodeStore for SqliteNodeStore {
    async fn save(&self, node: &Node) -> DomainResult<()> {
        node.validate()?;

        let samples = serde_json::to_string(&node.samples)?;
        let embedding = serde_json::to_string(&node.embedding)?;
        let projection = node.projection.as_ref().map(serde_json::to_string).transpose()?;
        let usage = node.usage.unwrap_or_default();
        let has_usage = node.usage.is_some();

        let result = sqlx::query(
            r"INSERT INTO nodes (id, strategy, samples, score, sample_count, depth, parent_id, embedding, projection,
                                 prompt_tokens, completion_tokens, cost_usd, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(id) DO NOTHING",
        )
        .bind(node.id.to_string())
        .bind(&node.strategy)
        .bind(samples)
        .bind(node.score)
        .bind(i64::from(node.sample_count))
        .bind(i64::from(node.depth))
        .bind(node.parent_id.map(|id| id.to_string()))
        .bind(embedding)
        .bind(projection)
        .bind(has_usage.then_some(usage.prompt_tokens as i64))
        .bind(has_usage.then_some(usage.completion_tokens as i64))
        .bind(has_usage.then_some(usage.cost_usd))
        .bind(node.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::ValidationFailed(format!("node {} already exists", node.id)));
        }

        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Node>> {
        let row: Option<NodeRow> = sqlx::query_as("SELECT * FROM nodes WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn get_all(&self) -> DomainResult<Vec<Node>> {
        let rows: Vec<NodeRow> = sqlx::query_as("SELECT * FROM nodes ORDER BY created_at, rowid")
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn top_by_score(&self, k: usize) -> DomainResult<Vec<Node>> {
        let rows: Vec<NodeRow> = sqlx::query_as(
            "SELECT * FROM nodes WHERE score IS NOT NULL ORDER BY score DESC, created_at, rowid LIMIT ?",
        )
        .bind(k as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn count(&self) -> DomainResult<usize> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM nodes").fetch_one(&self.pool).await?;
        Ok(count as usize)
    }
}

#[derive(sqlx::FromRow)]
struct NodeRow {
    id: String,
    strategy: String,
    samples: String,
    score: Option<f64>,
    sample_count: i64,
    depth: i64,
    parent_id: Option<String>,
    embedding: String,
    projection: Option<String>,
    prompt_tokens: Option<i64>,
    completion_tokens: Option<i64>,
    cost_usd: Option<f64>,
    created_at: String,
}

impl TryFrom<NodeRow> for Node {
    type Error = DomainError;

    fn try_from(row: NodeRow) -> Result<Self, Self::Error> {
        let projection: Option<Projection> = row.projection.as_deref().map(|s| serde_json::from_str(s)).transpose()?;

        let usage = match (row.prompt_tokens, row.completion_tokens, row.cost_usd) {
            (None, None, None) => None,
            (prompt, completion, cost) => Some(Usage {
                prompt_tokens: prompt.unwrap_or(0) as u64,
                completion_tokens: completion.unwrap_or(0) as u64,
                cost_usd: cost.unwrap_or(0.0),
            }),
        };

        Ok(Self {
            id: parse_uuid(&row.id)?,
            strategy: row.strategy,
            samples: serde_json::from_str(&row.samples)?,
            score: row.score,
            sample_count: u32::try_from(row.sample_count)
                .map_err(|e| DomainError::SerializationError(format!("sample_count: {e}")))?,
            depth: u32::try_from(row.depth).map_err(|e| DomainError::SerializationError(format!("depth: {e}")))?,
            parent_id: parse_optional_uuid(row.parent_id)?,
            embedding: serde_json::from_str(&row.embedding)?,
            projection,
            usage,
            created_at: parse_datetime(&row.created_at)?,
        })
    }
}
