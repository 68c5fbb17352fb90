//! `multiverse budget show | set`

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};
use serde::Serialize;

use crate::cli::context::AppContext;
use crate::cli::output::{format_usd, output, CommandOutput};
use crate::domain::models::Config;

#[derive(Args, Debug)]
pub struct BudgetArgs {
    #[command(subcommand)]
    pub command: BudgetCommands,
}

#[derive(Subcommand, Debug)]
pub enum BudgetCommands {
    /// Show the spend ceiling and the last spend recorded by a worker
    Show,
    /// Change the spend ceiling; a running worker picks it up on its next poll
    Set {
        /// New ceiling in USD
        #[arg(long, required_unless_present = "unlimited")]
        max_cost: Option<f64>,
        /// Remove the ceiling
        #[arg(long, conflicts_with = "max_cost")]
        unlimited: bool,
    },
}

#[derive(Debug, Serialize)]
pub struct BudgetOutput {
    pub max_cost_usd: Option<f64>,
    pub spent_usd: f64,
    pub calls: u64,
    pub remaining_usd: Option<f64>,
    pub recorded_at: Option<DateTime<Utc>>,
    pub updated: bool,
}

impl CommandOutput for BudgetOutput {
    fn to_human(&self) -> String {
        let mut lines = Vec::new();
        if self.updated {
            lines.push("Budget updated".to_string());
        }
        lines.push(format!("Ceiling:   {}", format_usd(self.max_cost_usd)));
        lines.push(format!("Spent:     ${:.4} ({} calls)", self.spent_usd, self.calls));
        lines.push(format!("Remaining: {}", format_usd(self.remaining_usd)));
        if let Some(at) = self.recorded_at {
            lines.push(format!("Recorded:  {}", at.to_rfc3339()));
        }
        lines.join("\n")
    }
}

pub async fn execute(args: BudgetArgs, config: Config, json_mode: bool) -> Result<()> {
    let ctx = AppContext::open(config).await?;

    let updated = match args.command {
        BudgetCommands::Show => false,
        BudgetCommands::Set { max_cost, unlimited } => {
            let ceiling = if unlimited { None } else { max_cost };
            if let Some(value) = ceiling {
                if !value.is_finite() || value <= 0.0 {
                    bail!("--max-cost must be a positive amount, got {value}");
                }
            }
            ctx.settings().save_max_cost(ceiling).await?;
            true
        }
    };

    let max_cost_usd = ctx.effective_max_cost().await?;
    let spend = ctx.settings().load_spend().await?.unwrap_or_default();
    output(
        &BudgetOutput {
            max_cost_usd,
            spent_usd: spend.cost_usd,
            calls: spend.calls,
            remaining_usd: max_cost_usd.map(|max| (max - spend.cost_usd).max(0.0)),
            recorded_at: spend.recorded_at,
            updated,
        },
        json_mode,
    );
    Ok(())
}
