//! `multiverse weights show | set`

use anyhow::{bail, Result};
use clap::{Args, Subcommand};
use serde::Serialize;

use crate::cli::context::AppContext;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::{Config, SchedulerWeights};
use crate::services::WeightsUpdate;

#[derive(Args, Debug)]
pub struct WeightsArgs {
    #[command(subcommand)]
    pub command: WeightsCommands,
}

#[derive(Subcommand, Debug)]
pub enum WeightsCommands {
    /// Show the weights a worker would use
    Show,
    /// Change one or more weights; a running worker picks them up on its next poll
    Set {
        /// Reward for improving over the parent
        #[arg(long)]
        trend: Option<f64>,
        /// Reward for novelty against the top-K
        #[arg(long)]
        sim: Option<f64>,
        /// Penalty per generation
        #[arg(long)]
        depth: Option<f64>,
    },
}

#[derive(Debug, Serialize)]
pub struct WeightsOutput {
    #[serde(flatten)]
    pub weights: SchedulerWeights,
    pub updated: bool,
}

impl CommandOutput for WeightsOutput {
    fn to_human(&self) -> String {
        let header = if self.updated { "Weights updated" } else { "Weights" };
        format!(
            "{header}\n  lambda_trend: {}\n  lambda_sim:   {}\n  lambda_depth: {}",
            self.weights.lambda_trend, self.weights.lambda_sim, self.weights.lambda_depth
        )
    }
}

pub async fn execute(args: WeightsArgs, config: Config, json_mode: bool) -> Result<()> {
    let ctx = AppContext::open(config).await?;

    let result = match args.command {
        WeightsCommands::Show => WeightsOutput {
            weights: ctx.effective_weights().await?,
            updated: false,
        },
        WeightsCommands::Set { trend, sim, depth } => {
            let update = WeightsUpdate {
                lambda_trend: trend,
                lambda_sim: sim,
                lambda_depth: depth,
            };
            if update.is_empty() {
                bail!("Nothing to set: pass at least one of --trend, --sim, --depth");
            }
            let weights = update.apply_to(ctx.effective_weights().await?)?;
            ctx.settings().save_weights(&weights).await?;
            WeightsOutput { weights, updated: true }
        }
    };

    output(&result, json_mode);
    Ok(())
}
