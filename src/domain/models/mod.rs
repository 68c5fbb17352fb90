pub mod config;
pub mod node;
pub mod queue;

pub use config::{
    BudgetConfig, Config, DatabaseConfig, EmbeddingBackend, EmbeddingConfig, EvaluationConfig, LlmConfig,
    LoggingConfig, RetryConfig, ScenarioConfig, SchedulerWeights, SearchConfig,
};
pub use node::{
    ConversationSample, Evaluation, GraphUpdate, Metered, Node, PerformanceSummary, Projection, Role, StopReason, Turn, Usage,
};
pub use queue::{PriorityQueue, QueueItem};
