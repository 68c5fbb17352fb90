//! `multiverse status`

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Args;
use serde::Serialize;

use crate::cli::context::AppContext;
use crate::cli::output::{format_score, format_usd, output, table, truncate, CommandOutput};
use crate::domain::models::{Config, SchedulerWeights};
use crate::domain::ports::{Frontier, NodeStore};

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Number of best nodes to list
    #[arg(long, default_value_t = 10)]
    pub top: usize,
}

#[derive(Debug, Serialize)]
pub struct TopNode {
    pub id: String,
    pub depth: u32,
    pub score: Option<f64>,
    pub sample_count: u32,
    pub strategy: String,
}

#[derive(Debug, Serialize)]
pub struct StatusOutput {
    pub node_count: usize,
    pub frontier_size: usize,
    pub spent_usd: f64,
    pub calls: u64,
    pub spend_recorded_at: Option<DateTime<Utc>>,
    pub max_cost_usd: Option<f64>,
    pub weights: SchedulerWeights,
    pub top: Vec<TopNode>,
}

impl CommandOutput for StatusOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![
            format!("Nodes: {}", self.node_count),
            format!("Frontier: {}", self.frontier_size),
            format!(
                "Spend: ${:.4} of {} ({} calls)",
                self.spent_usd,
                format_usd(self.max_cost_usd),
                self.calls
            ),
            format!(
                "Weights: trend={} sim={} depth={}",
                self.weights.lambda_trend, self.weights.lambda_sim, self.weights.lambda_depth
            ),
        ];

        if self.top.is_empty() {
            lines.push("No scored nodes yet.".to_string());
        } else {
            let mut t = table(&["ID", "Depth", "Score", "Samples", "Strategy"]);
            for node in &self.top {
                t.add_row(vec![
                    node.id.clone(),
                    node.depth.to_string(),
                    format_score(node.score),
                    node.sample_count.to_string(),
                    truncate(&node.strategy, 60),
                ]);
            }
            lines.push(t.to_string());
        }
        lines.join("\n")
    }
}

pub async fn execute(args: StatusArgs, config: Config, json_mode: bool) -> Result<()> {
    let ctx = AppContext::open(config).await?;
    let store = ctx.node_store();
    let spend = ctx.settings().load_spend().await?.unwrap_or_default();

    let top = store
        .top_by_score(args.top)
        .await?
        .into_iter()
        .map(|node| TopNode {
            id: node.id.to_string(),
            depth: node.depth,
            score: node.score,
            sample_count: node.sample_count,
            strategy: node.strategy,
        })
        .collect();

    let status = StatusOutput {
        node_count: store.count().await?,
        frontier_size: ctx.frontier().size().await?,
        spent_usd: spend.cost_usd,
        calls: spend.calls,
        spend_recorded_at: spend.recorded_at,
        max_cost_usd: ctx.effective_max_cost().await?,
        weights: ctx.effective_weights().await?,
        top,
    };
    output(&status, json_mode);
    Ok(())
}
