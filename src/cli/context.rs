//! Shared setup for CLI commands: configuration, logging and the database.

use std::path::Path;

use anyhow::{Context, Result};
use sqlx::SqlitePool;

use crate::adapters::sqlite::{initialize_database, SqliteFrontier, SqliteNodeStore, SqliteSettingsStore};
use crate::domain::models::{Config, SchedulerWeights};
use crate::infrastructure::config::ConfigLoader;
use crate::infrastructure::logging::{LogConfig, LoggerImpl};

/// Loads configuration and installs the global subscriber.
///
/// The returned logger must be kept alive for the rest of the process.
pub fn bootstrap(config_path: Option<&Path>, json: bool) -> Result<(Config, LoggerImpl)> {
    let config = ConfigLoader::load(config_path).context("Failed to load configuration")?;
    let log_config = LogConfig::try_from(&config.logging)?.with_json(json);
    let logger = LoggerImpl::init(&log_config)?;
    Ok((config, logger))
}

/// Open database plus the loaded configuration.
pub struct AppContext {
    pub config: Config,
    pub pool: SqlitePool,
}

impl AppContext {
    pub async fn open(config: Config) -> Result<Self> {
        let pool = initialize_database(&config.database)
            .await
            .with_context(|| format!("Failed to open database at {}", config.database.path))?;
        Ok(Self { config, pool })
    }

    pub fn node_store(&self) -> SqliteNodeStore {
        SqliteNodeStore::new(self.pool.clone())
    }

    pub fn frontier(&self) -> SqliteFrontier {
        SqliteFrontier::new(self.pool.clone())
    }

    pub fn settings(&self) -> SqliteSettingsStore {
        SqliteSettingsStore::new(self.pool.clone())
    }

    /// Persisted weights, falling back to the configured ones.
    pub async fn effective_weights(&self) -> Result<SchedulerWeights> {
        Ok(self.settings().load_weights().await?.unwrap_or(self.config.scheduler))
    }

    /// Persisted spend ceiling, falling back to the configured one.
    pub async fn effective_max_cost(&self) -> Result<Option<f64>> {
        Ok(self
            .settings()
            .load_max_cost()
            .await?
            .unwrap_or(self.config.budget.max_cost_usd))
    }
}
