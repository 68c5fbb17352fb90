pub mod analysis;
pub mod budget_tracker;
pub mod conversation_evaluator;
pub mod plateau;
pub mod priority_calculator;
pub mod retry;
pub mod search_worker;
pub mod seeding;
pub mod settings_sync;
pub mod weights;

pub use analysis::{analyze, lineage, SearchAnalysis};
pub use budget_tracker::{BudgetSnapshot, BudgetTracker};
pub use conversation_evaluator::ConversationEvaluator;
pub use plateau::{PlateauDetector, StopDecision};
pub use priority_calculator::{compute_priority, cosine_similarity, PriorityCalculator};
pub use retry::RetryPolicy;
pub use search_worker::{BatchReport, RunSummary, SearchCollaborators, SearchWorker, SearchWorkerConfig};
pub use seeding::{SeedRequest, Seeder};
pub use settings_sync::SettingsSync;
pub use weights::{SharedWeights, WeightsUpdate};
