//! Multiverse CLI entry point.

use std::process::ExitCode;

use clap::Parser;

use multiverse::cli::{commands, context, handle_error, Cli, Commands};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // The logger guard flushes file output when dropped at the end of main.
    let (config, _logger) = match context::bootstrap(cli.config.as_deref(), cli.json) {
        Ok(bootstrapped) => bootstrapped,
        Err(err) => {
            handle_error(&err, cli.json);
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Commands::Run(args) => commands::run::execute(args, config, cli.json).await,
        Commands::Seed(args) => commands::seed::execute(args, config, cli.json).await,
        Commands::Status(args) => commands::status::execute(args, config, cli.json).await,
        Commands::Weights(args) => commands::weights::execute(args, config, cli.json).await,
        Commands::Budget(args) => commands::budget::execute(args, config, cli.json).await,
        Commands::Lineage(args) => commands::lineage::execute(args, config, cli.json).await,
        Commands::Analyze(args) => commands::analyze::execute(args, config, cli.json).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            handle_error(&err, cli.json);
            ExitCode::FAILURE
        }
    }
}
