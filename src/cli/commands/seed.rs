//! `multiverse seed`

use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use crate::adapters::embeddings::build_provider;
use crate::cli::context::AppContext;
use crate::cli::output::{format_score, output, table, truncate, CommandOutput};
use crate::domain::models::{Config, Node};
use crate::services::{RetryPolicy, SeedRequest, Seeder};

#[derive(Args, Debug)]
pub struct SeedArgs {
    /// Root strategy text (repeatable)
    #[arg(short, long = "strategy")]
    pub strategies: Vec<String>,

    /// Number of additional roots with an empty strategy
    #[arg(long, default_value_t = 0)]
    pub empty: usize,

    /// Initial score recorded for every root
    #[arg(long)]
    pub score: Option<f64>,
}

impl From<SeedArgs> for SeedRequest {
    fn from(args: SeedArgs) -> Self {
        Self {
            strategies: args.strategies,
            empty: args.empty,
            score: args.score,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SeededRoot {
    pub id: String,
    pub score: Option<f64>,
    pub strategy: String,
}

#[derive(Debug, Serialize)]
pub struct SeedOutput {
    pub roots: Vec<SeededRoot>,
}

impl From<&Node> for SeededRoot {
    fn from(node: &Node) -> Self {
        Self {
            id: node.id.to_string(),
            score: node.score,
            strategy: node.strategy.clone(),
        }
    }
}

impl CommandOutput for SeedOutput {
    fn to_human(&self) -> String {
        let mut t = table(&["ID", "Score", "Strategy"]);
        for root in &self.roots {
            let strategy = if root.strategy.is_empty() {
                "(empty)".to_string()
            } else {
                truncate(&root.strategy, 60)
            };
            t.add_row(vec![root.id.clone(), format_score(root.score), strategy]);
        }
        format!("Seeded {} root(s)\n{t}", self.roots.len())
    }
}

pub async fn execute(args: SeedArgs, config: Config, json_mode: bool) -> Result<()> {
    let ctx = AppContext::open(config).await?;
    let embedder = build_provider(
        &ctx.config.embedding,
        &ctx.config.llm,
        RetryPolicy::from(&ctx.config.retry),
    )?;
    let seeder = Seeder::new(Arc::new(ctx.node_store()), Arc::new(ctx.frontier()), embedder);

    let roots = seeder.seed(&SeedRequest::from(args)).await?;
    output(
        &SeedOutput {
            roots: roots.iter().map(SeededRoot::from).collect(),
        },
        json_mode,
    );
    Ok(())
}
