//! `multiverse run`

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::adapters::embeddings::{build_provider, HashingEmbeddingProvider};
use crate::adapters::llm::{
    ChatModel, LlmCritic, LlmResponder, LlmTurnGenerator, LlmVariantGenerator, OpenAiChatClient,
};
use crate::adapters::memory::{InMemoryFrontier, InMemoryNodeStore};
use crate::adapters::notifier::LogNotifier;
use crate::adapters::simulated::{
    SimulatedCritic, SimulatedResponder, SimulatedTurnGenerator, SimulatedVariantGenerator,
};
use crate::cli::context::AppContext;
use crate::cli::output::{format_score, output, CommandOutput};
use crate::domain::models::Config;
use crate::domain::ports::{EmbeddingProvider, Frontier, NodeStore};
use crate::services::{
    BudgetTracker, ConversationEvaluator, PriorityCalculator, RetryPolicy, RunSummary, SearchCollaborators,
    SearchWorker, SearchWorkerConfig, SeedRequest, Seeder, SettingsSync, SharedWeights,
};

/// Empty roots seeded into the throwaway store of a dry run.
const DRY_RUN_ROOTS: usize = 3;
/// Batch limit of a dry run when `--max-batches` is not given.
const DRY_RUN_BATCHES: u64 = 5;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Use deterministic offline agents and an in-memory store
    #[arg(long)]
    pub dry_run: bool,

    /// Stop after this many non-empty batches
    #[arg(long)]
    pub max_batches: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct RunOutput {
    #[serde(flatten)]
    pub summary: RunSummary,
    pub dry_run: bool,
    pub node_count: usize,
    pub frontier_size: usize,
    pub best_score: Option<f64>,
    pub spent_usd: f64,
}

impl CommandOutput for RunOutput {
    fn to_human(&self) -> String {
        let mode = if self.dry_run { " (dry run)" } else { "" };
        format!(
            "Search stopped{mode}\n  Batches:            {}\n  Children created:   {}\n  Candidate failures: {}\n  Budget pauses:      {}\n  Nodes:              {}\n  Frontier:           {}\n  Best score:         {}\n  Spent:              ${:.4}",
            self.summary.batches,
            self.summary.children_created,
            self.summary.candidate_failures,
            self.summary.budget_pauses,
            self.node_count,
            self.frontier_size,
            format_score(self.best_score),
            self.spent_usd,
        )
    }
}

pub async fn execute(args: RunArgs, config: Config, json_mode: bool) -> Result<()> {
    let cancel = CancellationToken::new();
    spawn_ctrl_c_handler(cancel.clone());

    let result = if args.dry_run {
        dry_run(&config, args.max_batches.or(Some(DRY_RUN_BATCHES)), cancel).await?
    } else {
        live_run(config, args.max_batches, cancel).await?
    };

    output(&result, json_mode);
    Ok(())
}

fn spawn_ctrl_c_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown requested; finishing in-flight work");
                cancel.cancel();
            }
            Err(e) => warn!(error = %e, "Failed to listen for Ctrl-C"),
        }
    });
}

async fn dry_run(config: &Config, max_batches: Option<u64>, cancel: CancellationToken) -> Result<RunOutput> {
    let store = Arc::new(InMemoryNodeStore::new());
    let frontier = Arc::new(InMemoryFrontier::new());
    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(HashingEmbeddingProvider::new(config.embedding.dimension)?);

    Seeder::new(store.clone(), frontier.clone(), embedder.clone())
        .seed(&SeedRequest {
            empty: DRY_RUN_ROOTS,
            ..SeedRequest::default()
        })
        .await?;

    let budget = BudgetTracker::unlimited();
    let deps = SearchCollaborators {
        store,
        frontier,
        generator: Arc::new(SimulatedVariantGenerator),
        evaluator: Arc::new(ConversationEvaluator::new(
            Arc::new(SimulatedTurnGenerator),
            Arc::new(SimulatedResponder),
            Arc::new(SimulatedCritic),
            &config.evaluation,
        )),
        embedder,
        notifier: Arc::new(LogNotifier),
        priority: PriorityCalculator::with_weights(config.scheduler),
        budget,
    };

    run_worker(deps, config, max_batches, cancel, true).await
}

async fn live_run(config: Config, max_batches: Option<u64>, cancel: CancellationToken) -> Result<RunOutput> {
    let ctx = AppContext::open(config).await?;
    let config = &ctx.config;

    let weights = Arc::new(SharedWeights::new(config.scheduler));
    let budget = BudgetTracker::new(&config.budget);
    let sync = SettingsSync::new(
        ctx.settings(),
        weights.clone(),
        budget.clone(),
        Duration::from_secs(config.search.settings_poll_secs),
    );
    // Spend and settings from earlier runs win over the configuration file.
    sync.restore_spend().await?;
    sync.sync_once().await?;

    let retry = RetryPolicy::from(&config.retry);
    let chat: Arc<dyn ChatModel> = Arc::new(OpenAiChatClient::new(&config.llm, retry, budget.clone())?);
    let llm = &config.llm;

    let deps = SearchCollaborators {
        store: Arc::new(ctx.node_store()),
        frontier: Arc::new(ctx.frontier()),
        generator: Arc::new(LlmVariantGenerator::new(
            chat.clone(),
            llm.generator_model.clone(),
            llm.generation_temperature,
        )),
        evaluator: Arc::new(ConversationEvaluator::new(
            Arc::new(LlmTurnGenerator::new(
                chat.clone(),
                llm.generator_model.clone(),
                llm.generation_temperature,
            )),
            Arc::new(LlmResponder::new(chat.clone(), llm.responder_model.clone())),
            Arc::new(LlmCritic::new(chat, llm.critic_model.clone())),
            &config.evaluation,
        )),
        embedder: build_provider(&config.embedding, llm, retry)?,
        notifier: Arc::new(LogNotifier),
        priority: PriorityCalculator::new(weights),
        budget,
    };

    let sync_handle = sync.spawn(cancel.child_token());
    let result = run_worker(deps, config, max_batches, cancel.clone(), false).await;
    cancel.cancel();
    if let Err(e) = sync_handle.await {
        warn!(error = %e, "Settings sync task ended abnormally");
    }
    result
}

async fn run_worker(
    deps: SearchCollaborators,
    config: &Config,
    max_batches: Option<u64>,
    cancel: CancellationToken,
    dry_run: bool,
) -> Result<RunOutput> {
    let store = deps.store.clone();
    let frontier = deps.frontier.clone();
    let budget = deps.budget.clone();

    let worker_config = SearchWorkerConfig::new(&config.search, &config.budget).with_max_batches(max_batches);
    let summary = SearchWorker::new(deps, worker_config).run(cancel).await;

    let best_score = store.top_by_score(1).await?.first().and_then(|n| n.score);
    Ok(RunOutput {
        summary,
        dry_run,
        node_count: store.count().await?,
        frontier_size: frontier.size().await?,
        best_score,
        spent_usd: budget.snapshot().await.spent_usd,
    })
}
