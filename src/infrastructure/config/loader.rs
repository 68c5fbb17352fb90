use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Project configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "multiverse.yaml";
/// Optional local overrides, relative to the working directory.
pub const LOCAL_OVERRIDE_FILE: &str = ".multiverse/local.yaml";
pub const ENV_PREFIX: &str = "MULTIVERSE_";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidLogRotation(String),

    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("Invalid search.{0}: must be at least 1")]
    InvalidSearchSize(&'static str),

    #[error("Invalid scheduler weight {0}: {1}. Must be finite and non-negative")]
    InvalidWeight(&'static str, f64),

    #[error("Invalid min_turns: 0. Must be at least 1")]
    InvalidMinTurns,

    #[error("Invalid plateau_window: {0}. Must be at least 2")]
    InvalidPlateauWindow(usize),

    #[error("Invalid threshold evaluation.{0}: {1}. Must be within [0, 1]")]
    InvalidThreshold(&'static str, f64),

    #[error("At least one evaluation scenario is required")]
    NoScenarios,

    #[error("Scenario '{0}' must allow at least one turn")]
    InvalidScenario(String),

    #[error("Invalid max_retries: {0}. Cannot be 0")]
    InvalidMaxRetries(u32),

    #[error(
        "Invalid backoff configuration: initial_backoff_ms ({0}) must be less than max_backoff_ms ({1})"
    )]
    InvalidBackoff(u64, u64),

    #[error("Invalid budget ceiling: {0}. Must be positive")]
    InvalidBudget(String),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. `path`, or multiverse.yaml in the working directory
    /// 3. .multiverse/local.yaml (local overrides, optional)
    /// 4. Environment variables (`MULTIVERSE_*` prefix, `__` for nesting)
    pub fn load(path: Option<&Path>) -> Result<Config> {
        let project_file = path.map_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE), Path::to_path_buf);
        if path.is_some() && !project_file.exists() {
            anyhow::bail!("Config file not found: {}", project_file.display());
        }

        let config: Config = Self::figment(&project_file)
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    fn figment(project_file: &Path) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(project_file))
            .merge(Yaml::file(LOCAL_OVERRIDE_FILE))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        // Database
        if config.database.path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }
        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(config.database.max_connections));
        }

        // Logging
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }
        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }
        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidLogRotation(config.logging.rotation.clone()));
        }

        // Search
        for (name, value) in [
            ("batch_size", config.search.batch_size),
            ("children_per_node", config.search.children_per_node),
            ("top_k", config.search.top_k),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidSearchSize(name));
            }
        }

        // Scheduler weights
        for (name, value) in [
            ("lambda_trend", config.scheduler.lambda_trend),
            ("lambda_sim", config.scheduler.lambda_sim),
            ("lambda_depth", config.scheduler.lambda_depth),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidWeight(name, value));
            }
        }

        // Evaluation
        let evaluation = &config.evaluation;
        if evaluation.min_turns == 0 {
            return Err(ConfigError::InvalidMinTurns);
        }
        if evaluation.plateau_window < 2 {
            return Err(ConfigError::InvalidPlateauWindow(evaluation.plateau_window));
        }
        for (name, value) in [
            ("plateau_threshold", evaluation.plateau_threshold),
            ("early_success_threshold", evaluation.early_success_threshold),
            ("success_score", evaluation.success_score),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidThreshold(name, value));
            }
        }
        if evaluation.scenarios.is_empty() {
            return Err(ConfigError::NoScenarios);
        }
        if let Some(scenario) = evaluation.scenarios.iter().find(|s| s.max_turns == 0) {
            return Err(ConfigError::InvalidScenario(scenario.name.clone()));
        }

        // Retry
        if config.retry.max_retries == 0 {
            return Err(ConfigError::InvalidMaxRetries(config.retry.max_retries));
        }
        if config.retry.initial_backoff_ms >= config.retry.max_backoff_ms {
            return Err(ConfigError::InvalidBackoff(
                config.retry.initial_backoff_ms,
                config.retry.max_backoff_ms,
            ));
        }

        // Budget
        if let Some(max_cost) = config.budget.max_cost_usd {
            if !max_cost.is_finite() || max_cost <= 0.0 {
                return Err(ConfigError::InvalidBudget(format!("max_cost_usd = {max_cost}")));
            }
        }
        if config.budget.max_calls == Some(0) {
            return Err(ConfigError::InvalidBudget("max_calls = 0".to_string()));
        }

        if config.embedding.dimension == 0 {
            return Err(ConfigError::ValidationFailed(
                "embedding.dimension must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}
