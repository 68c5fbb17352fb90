//! Persisted runtime settings.
//!
//! Values are stored as JSON under fixed keys so a CLI process can change the weights or the
//! budget ceiling of a running worker, which polls them.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::domain::errors::DomainResult;
use crate::domain::models::SchedulerWeights;

const WEIGHTS_KEY: &str = "scheduler.weights";
const MAX_COST_KEY: &str = "budget.max_cost_usd";
const SPENT_KEY: &str = "budget.spent";

/// Spend snapshot written by the worker for `budget show`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SpendSnapshot {
    pub cost_usd: f64,
    pub calls: u64,
    pub recorded_at: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct SqliteSettingsStore {
    pool: SqlitePool,
}

impl SqliteSettingsStore {
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> DomainResult<Option<T>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|(value,)| serde_json::from_str(&value)).transpose().map_err(Into::into)
    }

    pub async fn set_json<T: Serialize + Sync>(&self, key: &str, value: &T) -> DomainResult<()> {
        let value = serde_json::to_string(value)?;
        sqlx::query(
            r"INSERT INTO settings (key, value, updated_at) VALUES (?, ?, datetime('now'))
               ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn load_weights(&self) -> DomainResult<Option<SchedulerWeights>> {
        self.get_json(WEIGHTS_KEY).await
    }

    pub async fn save_weights(&self, weights: &SchedulerWeights) -> DomainResult<()> {
        self.set_json(WEIGHTS_KEY, weights).await
    }

    /// Outer `None`: never set. Inner `None`: explicitly unlimited.
    pub async fn load_max_cost(&self) -> DomainResult<Option<Option<f64>>> {
        self.get_json(MAX_COST_KEY).await
    }

    pub async fn save_max_cost(&self, max_cost_usd: Option<f64>) -> DomainResult<()> {
        self.set_json(MAX_COST_KEY, &max_cost_usd).await
    }

    pub async fn load_spend(&self) -> DomainResult<Option<SpendSnapshot>> {
        self.get_json(SPENT_KEY).await
    }

    pub async fn save_spend(&self, snapshot: &SpendSnapshot) -> DomainResult<()> {
        self.set_json(SPENT_KEY, snapshot).await
    }
}
