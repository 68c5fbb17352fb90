//! `multiverse analyze`

use anyhow::Result;
use clap::Args;

use crate::cli::context::AppContext;
use crate::cli::output::{format_score, output, table, CommandOutput};
use crate::domain::models::Config;
use crate::domain::ports::NodeStore;
use crate::services::{analyze, SearchAnalysis};

#[derive(Args, Debug)]
pub struct AnalyzeArgs {}

impl CommandOutput for SearchAnalysis {
    fn to_human(&self) -> String {
        if self.total_nodes == 0 {
            return "No nodes yet. Seed some roots with `multiverse seed`.".to_string();
        }

        let mut t = table(&["Depth", "Nodes", "Scored", "Mean", "Std dev", "Min", "Max", "Best"]);
        for generation in &self.generations {
            t.add_row(vec![
                generation.depth.to_string(),
                generation.count.to_string(),
                generation.scored.to_string(),
                format_score(generation.mean),
                format_score(generation.std_dev),
                format_score(generation.min),
                format_score(generation.max),
                generation.best_preview.clone().unwrap_or_default(),
            ]);
        }

        let mut lines = vec![format!("Total nodes: {}", self.total_nodes), t.to_string()];
        if let Some(improvement) = self.avg_improvement_per_generation {
            lines.push(format!("Average improvement per generation: {improvement:+.4}"));
        }
        if let Some(best) = &self.best {
            lines.push(format!("Best node: {} (depth {}, score {:.3})", best.id, best.depth, best.score));
        }
        lines.join("\n")
    }
}

pub async fn execute(_args: AnalyzeArgs, config: Config, json_mode: bool) -> Result<()> {
    let ctx = AppContext::open(config).await?;
    let nodes = ctx.node_store().get_all().await?;
    output(&analyze(&nodes), json_mode);
    Ok(())
}
