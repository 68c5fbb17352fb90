//! `multiverse lineage <ID>`

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use uuid::Uuid;

use crate::cli::context::AppContext;
use crate::cli::output::{format_score, output, table, truncate, CommandOutput};
use crate::domain::models::{Config, Node};
use crate::services::lineage;

#[derive(Args, Debug)]
pub struct LineageArgs {
    /// Node ID
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct LineageStep {
    pub id: String,
    pub depth: u32,
    pub score: Option<f64>,
    pub sample_count: u32,
    pub strategy: String,
}

#[derive(Debug, Serialize)]
pub struct LineageOutput {
    pub path: Vec<LineageStep>,
}

impl From<&Node> for LineageStep {
    fn from(node: &Node) -> Self {
        Self {
            id: node.id.to_string(),
            depth: node.depth,
            score: node.score,
            sample_count: node.sample_count,
            strategy: node.strategy.clone(),
        }
    }
}

impl CommandOutput for LineageOutput {
    fn to_human(&self) -> String {
        let mut t = table(&["Depth", "ID", "Score", "Samples", "Strategy"]);
        for step in &self.path {
            t.add_row(vec![
                step.depth.to_string(),
                step.id.clone(),
                format_score(step.score),
                step.sample_count.to_string(),
                truncate(&step.strategy, 60),
            ]);
        }
        t.to_string()
    }
}

pub async fn execute(args: LineageArgs, config: Config, json_mode: bool) -> Result<()> {
    let id = Uuid::parse_str(args.id.trim()).with_context(|| format!("Invalid node ID: {}", args.id))?;
    let ctx = AppContext::open(config).await?;
    let path = lineage(&ctx.node_store(), id).await?;
    output(
        &LineageOutput {
            path: path.iter().map(LineageStep::from).collect(),
        },
        json_mode,
    );
    Ok(())
}
