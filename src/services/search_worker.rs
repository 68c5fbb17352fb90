//! Best-first batch expansion loop.
//!
//! Each iteration pops a batch of node ids from the frontier, takes one snapshot of the
//! top-K embeddings, and expands every popped node concurrently. Each expansion asks the
//! generator for `k` variants and evaluates them concurrently. A child is always written
//! to the node store before it is pushed to the frontier, and the change notification goes
//! out last.
//!
//! Failures are isolated to one candidate or one node. The loop itself only stops on
//! cancellation or when a configured batch limit is reached.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult, ServiceError};
use crate::domain::models::{BudgetConfig, GraphUpdate, Node, PerformanceSummary, SearchConfig};
use crate::domain::ports::{ChangeNotifier, EmbeddingProvider, Evaluator, Frontier, NodeStore, VariantGenerator};
use crate::services::budget_tracker::BudgetTracker;
use crate::services::priority_calculator::PriorityCalculator;

// ============================================================================
// Configuration and reports
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchWorkerConfig {
    pub batch_size: usize,
    pub children_per_node: usize,
    pub top_k: usize,
    pub idle_sleep: Duration,
    pub batch_cooldown: Duration,
    /// Upper bound on a single candidate evaluation.
    pub evaluation_timeout: Duration,
    pub heartbeat_interval: Duration,
    pub budget_pause: Duration,
    /// Stop after this many non-empty batches, or as soon as the frontier is empty.
    pub max_batches: Option<u64>,
}

impl Default for SearchWorkerConfig {
    fn default() -> Self {
        Self::new(&SearchConfig::default(), &BudgetConfig::default())
    }
}

impl SearchWorkerConfig {
    pub fn new(search: &SearchConfig, budget: &BudgetConfig) -> Self {
        Self {
            batch_size: search.batch_size,
            children_per_node: search.children_per_node,
            top_k: search.top_k,
            idle_sleep: Duration::from_millis(search.idle_sleep_ms),
            batch_cooldown: Duration::from_millis(search.batch_cooldown_ms),
            evaluation_timeout: Duration::from_secs(search.evaluation_timeout_secs),
            heartbeat_interval: Duration::from_secs(search.heartbeat_secs),
            budget_pause: Duration::from_secs(budget.pause_secs),
            max_batches: None,
        }
    }

    #[must_use]
    pub const fn with_max_batches(mut self, max_batches: Option<u64>) -> Self {
        self.max_batches = max_batches;
        self
    }
}

/// Outcome of one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// Frontier entries consumed.
    pub popped: usize,
    /// Nodes whose variants were generated.
    pub expanded: usize,
    /// Popped ids with no stored node, or whose read failed.
    pub skipped: usize,
    pub generation_failures: usize,
    pub candidate_failures: usize,
    pub children_created: usize,
    /// Children saved but never enqueued.
    pub orphans: usize,
}

impl BatchReport {
    fn absorb(&mut self, outcome: NodeOutcome) {
        match outcome {
            NodeOutcome::Skipped => self.skipped += 1,
            NodeOutcome::GenerationFailed => self.generation_failures += 1,
            NodeOutcome::Expanded {
                created,
                failed,
                orphans,
            } => {
                self.expanded += 1;
                self.children_created += created;
                self.candidate_failures += failed;
                self.orphans += orphans;
            }
        }
    }
}

/// Totals over a whole run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub batches: u64,
    pub children_created: u64,
    pub candidate_failures: u64,
    pub budget_pauses: u64,
}

/// Monitoring snapshot logged by the heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Heartbeat {
    pub frontier_size: usize,
    pub node_count: usize,
    pub children_created: u64,
    pub children_per_minute: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeOutcome {
    Skipped,
    GenerationFailed,
    Expanded { created: usize, failed: usize, orphans: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChildOutcome {
    Created,
    Orphaned,
}

// ============================================================================
// Worker
// ============================================================================

/// Everything the worker talks to.
#[derive(Clone)]
pub struct SearchCollaborators {
    pub store: Arc<dyn NodeStore>,
    pub frontier: Arc<dyn Frontier>,
    pub generator: Arc<dyn VariantGenerator>,
    pub evaluator: Arc<dyn Evaluator>,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub notifier: Arc<dyn ChangeNotifier>,
    pub priority: PriorityCalculator,
    pub budget: BudgetTracker,
}

/// Cheap to clone; clones share counters.
#[derive(Clone)]
pub struct SearchWorker {
    deps: SearchCollaborators,
    config: SearchWorkerConfig,
    children_created: Arc<AtomicU64>,
    started_at: Instant,
}

impl SearchWorker {
    pub fn new(deps: SearchCollaborators, config: SearchWorkerConfig) -> Self {
        Self {
            deps,
            config,
            children_created: Arc::new(AtomicU64::new(0)),
            started_at: Instant::now(),
        }
    }

    pub const fn config(&self) -> &SearchWorkerConfig {
        &self.config
    }

    /// Runs batches until `cancel` fires or the batch limit is reached.
    ///
    /// In-flight batch work finishes before returning; each evaluation carries its own
    /// timeout so shutdown is bounded.
    pub async fn run(&self, cancel: CancellationToken) -> RunSummary {
        let mut summary = RunSummary::default();
        let heartbeat = self.spawn_heartbeat(cancel.child_token());

        info!(
            batch_size = self.config.batch_size,
            children_per_node = self.config.children_per_node,
            top_k = self.config.top_k,
            max_batches = ?self.config.max_batches,
            "Search worker started"
        );

        while !cancel.is_cancelled() {
            if self.config.max_batches.is_some_and(|max| summary.batches >= max) {
                info!(batches = summary.batches, "Batch limit reached");
                break;
            }

            if self.deps.budget.is_exhausted().await {
                let snapshot = self.deps.budget.snapshot().await;
                warn!(
                    spent_usd = snapshot.spent_usd,
                    max_cost_usd = ?snapshot.max_cost_usd,
                    calls = snapshot.calls,
                    pause_secs = self.config.budget_pause.as_secs(),
                    "Budget exhausted; pausing expansion"
                );
                summary.budget_pauses += 1;
                if !pause(&cancel, self.config.budget_pause).await {
                    break;
                }
                continue;
            }

            match self.process_batch().await {
                Ok(report) if report.popped == 0 => {
                    if self.config.max_batches.is_some() {
                        info!("Frontier empty; stopping bounded run");
                        break;
                    }
                    debug!("Frontier empty; idling");
                    if !pause(&cancel, self.config.idle_sleep).await {
                        break;
                    }
                }
                Ok(report) => {
                    summary.batches += 1;
                    summary.children_created += report.children_created as u64;
                    summary.candidate_failures += report.candidate_failures as u64;
                    info!(
                        batch = summary.batches,
                        popped = report.popped,
                        expanded = report.expanded,
                        skipped = report.skipped,
                        generation_failures = report.generation_failures,
                        candidate_failures = report.candidate_failures,
                        children_created = report.children_created,
                        orphans = report.orphans,
                        "Batch complete"
                    );
                    if !pause(&cancel, self.config.batch_cooldown).await {
                        break;
                    }
                }
                Err(e) => {
                    error!(error = %e, "Batch failed");
                    if !pause(&cancel, self.config.idle_sleep).await {
                        break;
                    }
                }
            }
        }

        heartbeat.abort();
        info!(
            batches = summary.batches,
            children_created = summary.children_created,
            candidate_failures = summary.candidate_failures,
            "Search worker stopped"
        );
        summary
    }

    /// Pops one batch and expands every node in it.
    ///
    /// Only a failed pop is an error. Everything after the pop is isolated per node.
    pub async fn process_batch(&self) -> DomainResult<BatchReport> {
        let ids = self.deps.frontier.pop_batch(self.config.batch_size).await?;
        let mut report = BatchReport {
            popped: ids.len(),
            ..BatchReport::default()
        };
        if ids.is_empty() {
            return Ok(report);
        }

        let top_k = Arc::new(self.top_k_snapshot().await);
        debug!(popped = ids.len(), top_k = top_k.len(), "Batch acquired");

        let mut nodes = JoinSet::new();
        for id in ids {
            let worker = self.clone();
            let top_k = Arc::clone(&top_k);
            nodes.spawn(async move { worker.expand_node(id, top_k).await });
        }

        while let Some(joined) = nodes.join_next().await {
            match joined {
                Ok(outcome) => report.absorb(outcome),
                Err(e) => {
                    error!(error = %e, "Node expansion task panicked");
                    report.generation_failures += 1;
                }
            }
        }

        Ok(report)
    }

    /// Embeddings of the current best nodes. A failed read degrades to an empty set.
    async fn top_k_snapshot(&self) -> Vec<Vec<f32>> {
        match self.deps.store.top_by_score(self.config.top_k).await {
            Ok(nodes) => nodes.into_iter().map(|n| n.embedding).collect(),
            Err(e) => {
                warn!(error = %e, "Failed to read top-K snapshot; using empty set");
                Vec::new()
            }
        }
    }

    async fn expand_node(&self, id: Uuid, top_k: Arc<Vec<Vec<f32>>>) -> NodeOutcome {
        let parent = match self.deps.store.get(id).await {
            Ok(Some(parent)) => Arc::new(parent),
            Ok(None) => {
                warn!(node_id = %id, "Popped node missing from store; skipping");
                return NodeOutcome::Skipped;
            }
            Err(e) => {
                warn!(node_id = %id, error = %e, "Failed to read popped node; skipping");
                return NodeOutcome::Skipped;
            }
        };

        let performance = PerformanceSummary::of(&parent);
        let strategies = match self
            .deps
            .generator
            .generate_variants(&parent.strategy, &performance, self.config.children_per_node)
            .await
        {
            Ok(strategies) => strategies,
            Err(e) => {
                log_service_failure(id, "variant generation", &e);
                return NodeOutcome::GenerationFailed;
            }
        };

        let mut candidates = JoinSet::new();
        for strategy in strategies {
            let worker = self.clone();
            let parent = Arc::clone(&parent);
            let top_k = Arc::clone(&top_k);
            candidates.spawn(async move { worker.create_child(&parent, strategy, &top_k).await });
        }

        let (mut created, mut failed, mut orphans) = (0, 0, 0);
        while let Some(joined) = candidates.join_next().await {
            match joined {
                Ok(Ok(ChildOutcome::Created)) => created += 1,
                Ok(Ok(ChildOutcome::Orphaned)) => orphans += 1,
                Ok(Err(e)) => {
                    failed += 1;
                    match e {
                        DomainError::Service(service) => log_service_failure(id, "candidate evaluation", &service),
                        other => warn!(parent_id = %id, error = %other, "Candidate failed"),
                    }
                }
                Err(e) => {
                    failed += 1;
                    error!(parent_id = %id, error = %e, "Candidate task panicked");
                }
            }
        }

        NodeOutcome::Expanded {
            created,
            failed,
            orphans,
        }
    }

    /// Evaluates one candidate, then writes, enqueues and announces the child in that order.
    async fn create_child(&self, parent: &Node, strategy: String, top_k: &[Vec<f32>]) -> DomainResult<ChildOutcome> {
        let timeout = self.config.evaluation_timeout;
        let evaluation = tokio::time::timeout(timeout, self.deps.evaluator.evaluate(&strategy))
            .await
            .map_err(|_| ServiceError::Timeout(timeout))??;

        let embedding = self.deps.embedder.embed(&strategy).await?;
        let projection = self.deps.embedder.project(&embedding);
        let child = Node::child(parent, strategy, evaluation, embedding, Some(projection));
        let priority = self.deps.priority.calculate(&child, parent.score, top_k);

        self.deps.store.save(&child).await?;

        if let Err(e) = self.deps.frontier.push(child.id, priority).await {
            error!(
                child_id = %child.id,
                parent_id = %parent.id,
                error = %e,
                "Child saved but not enqueued; left orphaned"
            );
            return Ok(ChildOutcome::Orphaned);
        }

        self.deps.notifier.publish(GraphUpdate::from(&child));
        self.children_created.fetch_add(1, Ordering::Relaxed);

        info!(
            child_id = %child.id,
            parent_id = %parent.id,
            depth = child.depth,
            score = ?child.score,
            priority,
            sample_count = child.sample_count,
            "Child created"
        );
        Ok(ChildOutcome::Created)
    }

    /// Frontier size, node count and creation velocity.
    pub async fn heartbeat(&self) -> DomainResult<Heartbeat> {
        let frontier_size = self.deps.frontier.size().await?;
        let node_count = self.deps.store.count().await?;
        let children_created = self.children_created.load(Ordering::Relaxed);
        let minutes = self.started_at.elapsed().as_secs_f64() / 60.0;
        let children_per_minute = if minutes > 0.0 {
            children_created as f64 / minutes
        } else {
            0.0
        };

        Ok(Heartbeat {
            frontier_size,
            node_count,
            children_created,
            children_per_minute,
        })
    }

    fn spawn_heartbeat(&self, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        let worker = self.clone();
        let period = self.config.heartbeat_interval.max(Duration::from_secs(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => match worker.heartbeat().await {
                        Ok(beat) => info!(
                            frontier_size = beat.frontier_size,
                            node_count = beat.node_count,
                            children_created = beat.children_created,
                            children_per_minute = beat.children_per_minute,
                            "Heartbeat"
                        ),
                        Err(e) => warn!(error = %e, "Heartbeat failed"),
                    },
                }
            }
        })
    }
}

/// Sleeps for `duration` unless cancelled first. Returns false when cancelled.
async fn pause(cancel: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        () = cancel.cancelled() => false,
        () = tokio::time::sleep(duration) => true,
    }
}

fn log_service_failure(node_id: Uuid, stage: &str, error: &ServiceError) {
    if error.is_policy_violation() {
        warn!(node_id = %node_id, stage, error = %error, "Content policy violation; candidate unusable");
    } else {
        warn!(node_id = %node_id, stage, error = %error, "External service failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::embeddings::HashingEmbeddingProvider;
    use crate::adapters::memory::{InMemoryFrontier, InMemoryNodeStore};
    use crate::adapters::notifier::BroadcastNotifier;
    use crate::domain::errors::ServiceResult;
    use crate::domain::models::{Evaluation, SchedulerWeights};
    use async_trait::async_trait;

    struct NumberedVariants;

    #[async_trait]
    impl VariantGenerator for NumberedVariants {
        async fn generate_variants(&self, parent: &str, _: &PerformanceSummary, k: usize) -> ServiceResult<Vec<String>> {
            if parent.contains("refuse") {
                return Err(ServiceError::PolicyViolation("flagged".into()));
            }
            Ok((0..k).map(|i| format!("{parent} variant {i}")).collect())
        }
    }

    struct FixedEvaluator;

    #[async_trait]
    impl Evaluator for FixedEvaluator {
        async fn evaluate(&self, strategy: &str) -> ServiceResult<Evaluation> {
            if strategy.ends_with("variant 1") {
                return Err(ServiceError::MalformedResponse("bad critic output".into()));
            }
            Ok(Evaluation {
                score: 0.6,
                samples: vec![],
                sample_count: 3,
                usage: None,
            })
        }
    }

    fn worker(store: Arc<InMemoryNodeStore>, frontier: Arc<InMemoryFrontier>) -> (SearchWorker, Arc<BroadcastNotifier>) {
        let notifier = Arc::new(BroadcastNotifier::new(64));
        let deps = SearchCollaborators {
            store,
            frontier,
            generator: Arc::new(NumberedVariants),
            evaluator: Arc::new(FixedEvaluator),
            embedder: Arc::new(HashingEmbeddingProvider::new(16).unwrap()),
            notifier: notifier.clone(),
            priority: PriorityCalculator::with_weights(SchedulerWeights::default()),
            budget: BudgetTracker::unlimited(),
        };
        let config = SearchWorkerConfig {
            idle_sleep: Duration::from_millis(5),
            batch_cooldown: Duration::from_millis(1),
            ..SearchWorkerConfig::default()
        };
        (SearchWorker::new(deps, config), notifier)
    }

    async fn seed(store: &InMemoryNodeStore, frontier: &InMemoryFrontier, strategy: &str) -> Node {
        let root = Node::root(strategy, vec![1.0; 16], None).with_score(0.5, 1);
        store.save(&root).await.unwrap();
        frontier.push(root.id, 0.5).await.unwrap();
        root
    }

    #[tokio::test]
    async fn test_batch_isolates_candidate_failures() {
        let store = Arc::new(InMemoryNodeStore::new());
        let frontier = Arc::new(InMemoryFrontier::new());
        let root = seed(&store, &frontier, "be direct").await;
        let (worker, notifier) = worker(store.clone(), frontier.clone());
        let mut updates = notifier.subscribe();

        let report = worker.process_batch().await.unwrap();

        assert_eq!(report.popped, 1);
        assert_eq!(report.expanded, 1);
        assert_eq!(report.candidate_failures, 1);
        assert_eq!(report.children_created, 2);
        assert_eq!(frontier.size().await.unwrap(), 2);
        assert_eq!(store.count().await.unwrap(), 3);

        let update = updates.recv().await.unwrap();
        assert_eq!(update.parent_id, Some(root.id));
        let child = store.get(update.id).await.unwrap().unwrap();
        assert_eq!(child.depth, 1);
        assert!(child.projection.is_some());
    }

    #[tokio::test]
    async fn test_missing_parent_is_skipped() {
        let store = Arc::new(InMemoryNodeStore::new());
        let frontier = Arc::new(InMemoryFrontier::new());
        frontier.push(Uuid::new_v4(), 1.0).await.unwrap();
        seed(&store, &frontier, "be direct").await;
        let (worker, _) = worker(store, frontier.clone());

        let report = worker.process_batch().await.unwrap();
        assert_eq!(report.popped, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.children_created, 2);
    }

    #[tokio::test]
    async fn test_generation_failure_drops_node() {
        let store = Arc::new(InMemoryNodeStore::new());
        let frontier = Arc::new(InMemoryFrontier::new());
        seed(&store, &frontier, "refuse everything").await;
        let (worker, _) = worker(store.clone(), frontier.clone());

        let report = worker.process_batch().await.unwrap();
        assert_eq!(report.generation_failures, 1);
        assert_eq!(report.children_created, 0);
        assert_eq!(frontier.size().await.unwrap(), 0);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_empty_frontier_returns_empty_report() {
        let (worker, _) = worker(Arc::new(InMemoryNodeStore::new()), Arc::new(InMemoryFrontier::new()));
        assert_eq!(worker.process_batch().await.unwrap(), BatchReport::default());
    }

    #[tokio::test]
    async fn test_run_stops_at_batch_limit() {
        let store = Arc::new(InMemoryNodeStore::new());
        let frontier = Arc::new(InMemoryFrontier::new());
        seed(&store, &frontier, "be direct").await;
        let (mut worker, _) = worker(store, frontier);
        worker.config.max_batches = Some(2);

        let summary = worker.run(CancellationToken::new()).await;
        assert_eq!(summary.batches, 2);
        assert!(summary.children_created >= 2);
    }

    #[tokio::test]
    async fn test_run_honours_cancellation() {
        let (worker, _) = worker(Arc::new(InMemoryNodeStore::new()), Arc::new(InMemoryFrontier::new()));
        let cancel = CancellationToken::new();
        let handle = {
            let cancel = cancel.clone();
            tokio::spawn(async move { worker.run(cancel).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();
        let summary = tokio::time::timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
        assert_eq!(summary.batches, 0);
    }

    #[tokio::test]
    async fn test_budget_exhaustion_pauses_instead_of_failing() {
        let store = Arc::new(InMemoryNodeStore::new());
        let frontier = Arc::new(InMemoryFrontier::new());
        seed(&store, &frontier, "be direct").await;
        let (mut worker, _) = worker(store, frontier.clone());
        let budget = BudgetTracker::new(&BudgetConfig {
            max_cost_usd: Some(0.01),
            daily_reset: false,
            ..BudgetConfig::default()
        });
        budget.record(1.0).await;
        worker.deps.budget = budget;
        worker.config.budget_pause = Duration::from_millis(10);

        let cancel = CancellationToken::new();
        let handle = {
            let worker = worker.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { worker.run(cancel).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
        let summary = handle.await.unwrap();

        assert_eq!(summary.batches, 0);
        assert!(summary.budget_pauses >= 1);
        assert_eq!(frontier.size().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_heartbeat_counts() {
        let store = Arc::new(InMemoryNodeStore::new());
        let frontier = Arc::new(InMemoryFrontier::new());
        seed(&store, &frontier, "be direct").await;
        let (worker, _) = worker(store, frontier);
        worker.process_batch().await.unwrap();

        let beat = worker.heartbeat().await.unwrap();
        assert_eq!(beat.node_count, 3);
        assert_eq!(beat.frontier_size, 2);
        assert_eq!(beat.children_created, 2);
    }
}
