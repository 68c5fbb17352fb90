//! A failure while expanding one node or candidate never affects its siblings.

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use common::{build_worker, worker_config, LengthEvaluator, SuffixGenerator};
use multiverse::adapters::memory::{InMemoryFrontier, InMemoryNodeStore};
use multiverse::domain::errors::ServiceResult;
use multiverse::domain::models::{Evaluation, Node};
use multiverse::domain::ports::{Evaluator, Frontier, NodeStore};

async fn seeded(strategies: &[&str]) -> (Arc<InMemoryNodeStore>, Arc<InMemoryFrontier>) {
    let store = Arc::new(InMemoryNodeStore::new());
    let frontier = Arc::new(InMemoryFrontier::new());
    for strategy in strategies {
        let root = Node::root(*strategy, vec![1.0, 0.0], None).with_score(0.5, 1);
        store.save(&root).await.unwrap();
        frontier.push(root.id, 0.5).await.unwrap();
    }
    (store, frontier)
}

fn children_of(nodes: &[Node], parent: &Node) -> usize {
    nodes.iter().filter(|n| n.parent_id == Some(parent.id)).count()
}

#[tokio::test]
async fn test_generation_failure_drops_only_that_node() {
    let (store, frontier) = seeded(&["alpha", "beta", "gamma"]).await;
    let generator = Arc::new(SuffixGenerator::failing_for(&["beta"]));
    let (worker, _) = build_worker(
        store.clone(),
        frontier.clone(),
        generator.clone(),
        Arc::new(LengthEvaluator::default()),
        worker_config(10, 3),
    );

    let report = worker.process_batch().await.unwrap();
    assert_eq!(report.popped, 3);
    assert_eq!(report.generation_failures, 1);
    assert_eq!(report.expanded, 2);
    assert_eq!(report.children_created, 6);

    // The failed node is not re-queued.
    assert_eq!(frontier.size().await.unwrap(), 6);

    let nodes = store.get_all().await.unwrap();
    let beta = nodes.iter().find(|n| n.strategy == "beta").unwrap();
    assert_eq!(children_of(&nodes, beta), 0);
}

#[tokio::test]
async fn test_candidate_failure_keeps_sibling_candidates() {
    let (store, frontier) = seeded(&["alpha", "beta"]).await;
    let (worker, _) = build_worker(
        store.clone(),
        frontier.clone(),
        Arc::new(SuffixGenerator::default()),
        Arc::new(LengthEvaluator::failing_on(&["/ v1"])),
        worker_config(10, 3),
    );

    let report = worker.process_batch().await.unwrap();
    assert_eq!(report.expanded, 2);
    assert_eq!(report.candidate_failures, 2);
    assert_eq!(report.children_created, 4);

    let nodes = store.get_all().await.unwrap();
    assert!(nodes.iter().all(|n| !n.strategy.ends_with("/ v1")));
    for root in nodes.iter().filter(|n| n.depth == 0) {
        assert_eq!(children_of(&nodes, root), 2);
    }
}

#[tokio::test]
async fn test_missing_node_is_skipped() {
    let (store, frontier) = seeded(&["alpha"]).await;
    frontier.push(Uuid::new_v4(), 0.9).await.unwrap();

    let (worker, _) = build_worker(
        store,
        frontier.clone(),
        Arc::new(SuffixGenerator::default()),
        Arc::new(LengthEvaluator::default()),
        worker_config(10, 2),
    );

    let report = worker.process_batch().await.unwrap();
    assert_eq!(report.popped, 2);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.children_created, 2);
    assert_eq!(frontier.size().await.unwrap(), 2);
}

/// Hangs on strategies containing "slow"; otherwise delegates to [`LengthEvaluator`].
struct SlowEvaluator {
    inner: LengthEvaluator,
}

#[async_trait]
impl Evaluator for SlowEvaluator {
    async fn evaluate(&self, strategy: &str) -> ServiceResult<Evaluation> {
        if strategy.contains("slow") {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        self.inner.evaluate(strategy).await
    }
}

#[tokio::test]
async fn test_evaluation_timeout_is_a_candidate_failure() {
    let (store, frontier) = seeded(&["slow", "fast"]).await;
    let mut config = worker_config(10, 2);
    config.evaluation_timeout = Duration::from_millis(100);

    let (worker, _) = build_worker(
        store.clone(),
        frontier,
        Arc::new(SuffixGenerator::default()),
        Arc::new(SlowEvaluator {
            inner: LengthEvaluator::default(),
        }),
        config,
    );

    let started = std::time::Instant::now();
    let report = worker.process_batch().await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(report.candidate_failures, 2);
    assert_eq!(report.children_created, 2);

    let nodes = store.get_all().await.unwrap();
    assert!(nodes.iter().filter(|n| n.depth == 1).all(|n| n.strategy.starts_with("fast")));
}
