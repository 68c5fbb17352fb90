//! Command-line interface.

pub mod commands;
pub mod context;
pub mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::{analyze::AnalyzeArgs, budget::BudgetArgs, lineage::LineageArgs, run::RunArgs};
use commands::{seed::SeedArgs, status::StatusArgs, weights::WeightsArgs};

#[derive(Parser, Debug)]
#[command(name = "multiverse")]
#[command(about = "Best-first search over system-prompt strategies", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Configuration file (defaults to ./multiverse.yaml when present)
    #[arg(long, global = true, env = "MULTIVERSE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the search worker until Ctrl-C or a batch limit
    Run(RunArgs),
    /// Create root strategies
    Seed(SeedArgs),
    /// Show node count, frontier size, spend and the best nodes
    Status(StatusArgs),
    /// Show or change the priority weights
    Weights(WeightsArgs),
    /// Show or change the spend ceiling
    Budget(BudgetArgs),
    /// Show the path from a root to a node
    Lineage(LineageArgs),
    /// Summarize the search per generation
    Analyze(AnalyzeArgs),
}

/// Print a command failure to stderr.
pub fn handle_error(err: &anyhow::Error, json_mode: bool) {
    if json_mode {
        let chain: Vec<String> = err.chain().skip(1).map(ToString::to_string).collect();
        let body = serde_json::json!({
            "error": err.to_string(),
            "causes": chain,
        });
        eprintln!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!("Error: {err:#}");
    }
}
