use serde::{Deserialize, Serialize};

/// Main configuration structure for multiverse
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Worker loop configuration
    #[serde(default)]
    pub search: SearchConfig,

    /// Initial priority weights; may be changed at runtime
    #[serde(default)]
    pub scheduler: SchedulerWeights,

    /// Simulated-dialogue evaluation
    #[serde(default)]
    pub evaluation: EvaluationConfig,

    /// Spend ceilings
    #[serde(default)]
    pub budget: BudgetConfig,

    /// Chat model client
    #[serde(default)]
    pub llm: LlmConfig,

    /// Retry policy configuration
    #[serde(default)]
    pub retry: RetryConfig,

    /// Embedding provider
    #[serde(default)]
    pub embedding: EmbeddingConfig,
}

/// Database configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// Path to `SQLite` database file
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Maximum number of database connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> String {
    ".multiverse/multiverse.db".to_string()
}

const fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

impl DatabaseConfig {
    /// `sqlx` connection URL for the configured path.
    pub fn url(&self) -> String {
        if self.path.starts_with("sqlite:") {
            self.path.clone()
        } else {
            format!("sqlite:{}", self.path)
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files; stdout only when unset
    #[serde(default)]
    pub log_dir: Option<String>,

    /// Rotation of log files: daily, hourly or never
    #[serde(default = "default_rotation")]
    pub rotation: String,

    /// Also log to stdout when a log directory is set
    #[serde(default = "default_true")]
    pub enable_stdout: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

const fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
            enable_stdout: true,
        }
    }
}

/// Worker loop configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SearchConfig {
    /// Frontier entries popped per batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Variants requested per expanded node
    #[serde(default = "default_children_per_node")]
    pub children_per_node: usize,

    /// Size of the top-scoring embedding snapshot used for novelty
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Sleep when the frontier is empty
    #[serde(default = "default_idle_sleep_ms")]
    pub idle_sleep_ms: u64,

    /// Pause between batches
    #[serde(default = "default_batch_cooldown_ms")]
    pub batch_cooldown_ms: u64,

    /// Upper bound for one `Evaluate` call
    #[serde(default = "default_evaluation_timeout_secs")]
    pub evaluation_timeout_secs: u64,

    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,

    /// How often persisted runtime settings are re-read
    #[serde(default = "default_settings_poll_secs")]
    pub settings_poll_secs: u64,
}

const fn default_batch_size() -> usize {
    20
}

const fn default_children_per_node() -> usize {
    3
}

const fn default_top_k() -> usize {
    10
}

const fn default_idle_sleep_ms() -> u64 {
    1000
}

const fn default_batch_cooldown_ms() -> u64 {
    100
}

const fn default_evaluation_timeout_secs() -> u64 {
    300
}

const fn default_heartbeat_secs() -> u64 {
    15
}

const fn default_settings_poll_secs() -> u64 {
    5
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            children_per_node: default_children_per_node(),
            top_k: default_top_k(),
            idle_sleep_ms: default_idle_sleep_ms(),
            batch_cooldown_ms: default_batch_cooldown_ms(),
            evaluation_timeout_secs: default_evaluation_timeout_secs(),
            heartbeat_secs: default_heartbeat_secs(),
            settings_poll_secs: default_settings_poll_secs(),
        }
    }
}

/// Weights of the priority function
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SchedulerWeights {
    /// Reward for improving over the parent
    #[serde(default = "default_lambda_trend")]
    pub lambda_trend: f64,

    /// Reward for distance from the current top-K
    #[serde(default = "default_lambda_sim")]
    pub lambda_sim: f64,

    /// Penalty per generation
    #[serde(default = "default_lambda_depth")]
    pub lambda_depth: f64,
}

const fn default_lambda_trend() -> f64 {
    0.3
}

const fn default_lambda_sim() -> f64 {
    0.2
}

const fn default_lambda_depth() -> f64 {
    0.05
}

impl Default for SchedulerWeights {
    fn default() -> Self {
        Self {
            lambda_trend: default_lambda_trend(),
            lambda_sim: default_lambda_sim(),
            lambda_depth: default_lambda_depth(),
        }
    }
}

impl SchedulerWeights {
    /// Finite and non-negative in every component.
    pub fn is_valid(&self) -> bool {
        [self.lambda_trend, self.lambda_sim, self.lambda_depth]
            .iter()
            .all(|w| w.is_finite() && *w >= 0.0)
    }
}

/// A simulated conversation setting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ScenarioConfig {
    pub name: String,
    /// Disposition handed to the responder
    pub mood: String,
    pub max_turns: usize,
}

impl ScenarioConfig {
    pub fn new(name: impl Into<String>, mood: impl Into<String>, max_turns: usize) -> Self {
        Self {
            name: name.into(),
            mood: mood.into(),
            max_turns,
        }
    }
}

/// Simulated-dialogue evaluation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EvaluationConfig {
    /// Turns scored before early stopping is considered
    #[serde(default = "default_min_turns")]
    pub min_turns: usize,

    /// Number of recent scores inspected for a plateau
    #[serde(default = "default_plateau_window")]
    pub plateau_window: usize,

    /// Average per-turn improvement below which a conversation has plateaued
    #[serde(default = "default_plateau_threshold")]
    pub plateau_threshold: f64,

    /// Latest score above which a conversation stops as a success
    #[serde(default = "default_early_success_threshold")]
    pub early_success_threshold: f64,

    /// Conversation score above which it counts toward the efficiency bonus
    #[serde(default = "default_success_score")]
    pub success_score: f64,

    /// Upper bound for one conversation
    #[serde(default = "default_conversation_timeout_secs")]
    pub conversation_timeout_secs: u64,

    #[serde(default = "default_scenarios")]
    pub scenarios: Vec<ScenarioConfig>,
}

const fn default_min_turns() -> usize {
    3
}

const fn default_plateau_window() -> usize {
    3
}

const fn default_plateau_threshold() -> f64 {
    0.05
}

const fn default_early_success_threshold() -> f64 {
    0.85
}

const fn default_success_score() -> f64 {
    0.7
}

const fn default_conversation_timeout_secs() -> u64 {
    120
}

fn default_scenarios() -> Vec<ScenarioConfig> {
    vec![
        ScenarioConfig::new("cold_outreach", "skeptical_but_listening", 8),
        ScenarioConfig::new("pragmatic_review", "economically_pragmatic", 6),
        ScenarioConfig::new("guarded_after_loss", "security_focused", 10),
    ]
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            min_turns: default_min_turns(),
            plateau_window: default_plateau_window(),
            plateau_threshold: default_plateau_threshold(),
            early_success_threshold: default_early_success_threshold(),
            success_score: default_success_score(),
            conversation_timeout_secs: default_conversation_timeout_secs(),
            scenarios: default_scenarios(),
        }
    }
}

/// Spend ceilings for external calls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BudgetConfig {
    /// Maximum spend in USD; unlimited when unset
    #[serde(default = "default_max_cost_usd")]
    pub max_cost_usd: Option<f64>,

    /// Maximum number of external calls; unlimited when unset
    #[serde(default)]
    pub max_calls: Option<u64>,

    /// Sleep between budget re-checks while exhausted
    #[serde(default = "default_pause_secs")]
    pub pause_secs: u64,

    /// Reset spend at UTC midnight
    #[serde(default = "default_true")]
    pub daily_reset: bool,
}

#[allow(clippy::unnecessary_wraps)]
const fn default_max_cost_usd() -> Option<f64> {
    Some(2.0)
}

const fn default_pause_secs() -> u64 {
    60
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            max_cost_usd: default_max_cost_usd(),
            max_calls: None,
            pause_secs: default_pause_secs(),
            daily_reset: true,
        }
    }
}

/// OpenAI-compatible chat client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LlmConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// API key (can also be set via `OPENAI_API_KEY`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_model")]
    pub generator_model: String,

    #[serde(default = "default_model")]
    pub responder_model: String,

    #[serde(default = "default_model")]
    pub critic_model: String,

    /// Sampling temperature for variant and turn generation
    #[serde(default = "default_generation_temperature")]
    pub generation_temperature: f32,

    /// Token budget per prompt; content is truncated at ~4 chars per token
    #[serde(default = "default_max_prompt_tokens")]
    pub max_prompt_tokens: usize,

    /// Run moderation on user content before each chat call
    #[serde(default = "default_true")]
    pub moderation: bool,

    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

const fn default_generation_temperature() -> f32 {
    0.9
}

const fn default_max_prompt_tokens() -> usize {
    2048
}

const fn default_requests_per_second() -> u32 {
    10
}

const fn default_request_timeout_secs() -> u64 {
    60
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            generator_model: default_model(),
            responder_model: default_model(),
            critic_model: default_model(),
            generation_temperature: default_generation_temperature(),
            max_prompt_tokens: default_max_prompt_tokens(),
            moderation: true,
            requests_per_second: default_requests_per_second(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Retry policy configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial backoff delay in milliseconds
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Maximum backoff delay in milliseconds
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_initial_backoff_ms() -> u64 {
    4000
}

const fn default_max_backoff_ms() -> u64 {
    10_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

/// Which embedding backend to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingBackend {
    /// Deterministic local feature hashing
    #[default]
    Hashing,
    /// OpenAI-compatible `/embeddings` endpoint
    Openai,
}

/// Embedding configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub provider: EmbeddingBackend,

    /// Vector length; must match the remote model when using `openai`
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    #[serde(default = "default_embedding_model")]
    pub model: String,
}

const fn default_embedding_dimension() -> usize {
    64
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingBackend::default(),
            dimension: default_embedding_dimension(),
            model: default_embedding_model(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.search.batch_size, 20);
        assert_eq!(config.search.children_per_node, 3);
        assert_eq!(config.search.top_k, 10);
        assert_eq!(config.scheduler.lambda_trend, 0.3);
        assert_eq!(config.scheduler.lambda_sim, 0.2);
        assert_eq!(config.scheduler.lambda_depth, 0.05);
        assert_eq!(config.evaluation.min_turns, 3);
        assert_eq!(config.evaluation.scenarios.len(), 3);
        assert_eq!(config.budget.max_cost_usd, Some(2.0));
        assert_eq!(config.retry.initial_backoff_ms, 4000);
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = r"
search:
  batch_size: 5
scheduler:
  lambda_sim: 0.5
embedding:
  provider: openai
  dimension: 1536
";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.search.batch_size, 5);
        assert_eq!(config.search.top_k, 10);
        assert_eq!(config.scheduler.lambda_sim, 0.5);
        assert_eq!(config.scheduler.lambda_trend, 0.3);
        assert_eq!(config.embedding.provider, EmbeddingBackend::Openai);
        assert_eq!(config.database, DatabaseConfig::default());
    }

    #[test]
    fn test_weights_validity() {
        assert!(SchedulerWeights::default().is_valid());
        let weights = SchedulerWeights {
            lambda_trend: -0.1,
            ..SchedulerWeights::default()
        };
        assert!(!weights.is_valid());
        let weights = SchedulerWeights {
            lambda_sim: f64::NAN,
            ..SchedulerWeights::default()
        };
        assert!(!weights.is_valid());
    }

    #[test]
    fn test_database_url() {
        let config = DatabaseConfig::default();
        assert_eq!(config.url(), "sqlite:.multiverse/multiverse.db");
        let config = DatabaseConfig {
            path: "sqlite::memory:".to_string(),
            max_connections: 1,
        };
        assert_eq!(config.url(), "sqlite::memory:");
    }
}
