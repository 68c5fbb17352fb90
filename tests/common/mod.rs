//! Common test utilities for integration tests
//!
//! Mock collaborators and worker wiring shared by the integration test files.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use multiverse::adapters::embeddings::HashingEmbeddingProvider;
use multiverse::adapters::notifier::BroadcastNotifier;
use multiverse::domain::errors::{ServiceError, ServiceResult};
use multiverse::domain::models::{Evaluation, PerformanceSummary, SchedulerWeights, Usage};
use multiverse::domain::ports::{Evaluator, Frontier, NodeStore, VariantGenerator};
use multiverse::services::{
    BudgetTracker, PriorityCalculator, SearchCollaborators, SearchWorker, SearchWorkerConfig,
};

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Returns `"{parent} / v{i}"` for each requested variant. Parents listed in
/// `failing_parents` fail with a transient error.
#[derive(Default)]
pub struct SuffixGenerator {
    pub failing_parents: HashSet<String>,
    pub calls: AtomicUsize,
}

impl SuffixGenerator {
    pub fn failing_for(parents: &[&str]) -> Self {
        Self {
            failing_parents: parents.iter().map(|p| (*p).to_string()).collect(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl VariantGenerator for SuffixGenerator {
    async fn generate_variants(
        &self,
        parent_strategy: &str,
        _performance: &PerformanceSummary,
        k: usize,
    ) -> ServiceResult<Vec<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_parents.contains(parent_strategy) {
            return Err(ServiceError::Transient("generator unavailable".to_string()));
        }
        let variants = (0..k).map(|i| format!("{parent_strategy} / v{i}")).collect();
        Ok(variants)
    }
}

/// Scores a strategy by its length, capped at 1.0. Strategies containing any
/// of `failing_markers` fail.
#[derive(Default)]
pub struct LengthEvaluator {
    pub failing_markers: Vec<String>,
    pub evaluated: Mutex<Vec<String>>,
}

impl LengthEvaluator {
    pub fn failing_on(markers: &[&str]) -> Self {
        Self {
            failing_markers: markers.iter().map(|m| (*m).to_string()).collect(),
            evaluated: Mutex::new(Vec::new()),
        }
    }

    pub fn score_of(strategy: &str) -> f64 {
        (strategy.len() as f64 / 100.0).min(1.0)
    }
}

#[async_trait]
impl Evaluator for LengthEvaluator {
    async fn evaluate(&self, strategy: &str) -> ServiceResult<Evaluation> {
        self.evaluated.lock().unwrap().push(strategy.to_string());
        if self.failing_markers.iter().any(|m| strategy.contains(m.as_str())) {
            return Err(ServiceError::Failed(format!("cannot score {strategy}")));
        }
        Ok(Evaluation {
            score: Self::score_of(strategy),
            samples: vec![],
            sample_count: 3,
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                cost_usd: 0.001,
            }),
        })
    }
}

pub fn worker_config(batch_size: usize, children_per_node: usize) -> SearchWorkerConfig {
    SearchWorkerConfig {
        batch_size,
        children_per_node,
        top_k: 5,
        idle_sleep: Duration::from_millis(10),
        batch_cooldown: Duration::from_millis(1),
        evaluation_timeout: Duration::from_secs(5),
        heartbeat_interval: Duration::from_secs(60),
        budget_pause: Duration::from_millis(10),
        max_batches: None,
    }
}

/// Wires a worker around the given store, frontier and collaborators.
pub fn build_worker(
    store: Arc<dyn NodeStore>,
    frontier: Arc<dyn Frontier>,
    generator: Arc<dyn VariantGenerator>,
    evaluator: Arc<dyn Evaluator>,
    config: SearchWorkerConfig,
) -> (SearchWorker, Arc<BroadcastNotifier>) {
    let notifier = Arc::new(BroadcastNotifier::default());
    let deps = SearchCollaborators {
        store,
        frontier,
        generator,
        evaluator,
        embedder: Arc::new(HashingEmbeddingProvider::new(32).unwrap()),
        notifier: notifier.clone(),
        priority: PriorityCalculator::with_weights(SchedulerWeights::default()),
        budget: BudgetTracker::unlimited(),
    };
    (SearchWorker::new(deps, config), notifier)
}
