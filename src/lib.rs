//! Multiverse - best-first search over system-prompt strategies
//!
//! Candidate strategies form a forest. A worker repeatedly pops the most promising nodes
//! from a priority frontier, asks a generator for variants, scores each variant with
//! simulated multi-turn conversations, and enqueues the children under a priority that
//! rewards improvement over the parent and novelty against the current best nodes.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): node model, configuration, errors and ports
//! - **Adapters** (`adapters`): SQLite and in-memory stores, chat-model and embedding clients
//! - **Service Layer** (`services`): priority, plateau detection, evaluation, the worker loop
//! - **Infrastructure Layer** (`infrastructure`): configuration loading and logging
//! - **CLI Layer** (`cli`): command-line interface

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{DomainError, DomainResult, ServiceError, ServiceResult};
pub use domain::models::{Config, Evaluation, Node, SchedulerWeights};
pub use domain::ports::{ChangeNotifier, EmbeddingProvider, Evaluator, Frontier, NodeStore, VariantGenerator};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{compute_priority, PriorityCalculator, SearchWorker};
