//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines the interfaces that adapters implement:
//! - NodeStore: durable node records
//! - Frontier: priority queue of node ids awaiting expansion
//! - EmbeddingProvider: text vectorization and 2-D projection
//! - VariantGenerator / Evaluator and their sub-services: external generation and scoring
//! - ChangeNotifier: best-effort change broadcast
//! - WeightsProvider: runtime priority weights

pub mod embedding;
pub mod evaluation;
pub mod frontier;
pub mod node_store;
pub mod notifier;
pub mod weights;

pub use embedding::EmbeddingProvider;
pub use evaluation::{Critic, Evaluator, Responder, TurnGenerator, VariantGenerator};
pub use frontier::{check_priority, Frontier};
pub use node_store::NodeStore;
pub use notifier::ChangeNotifier;
pub use weights::WeightsProvider;
