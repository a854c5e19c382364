//! `polyroute` -- CLI binary for the polyroute LLM router.
//!
//! Provides the following subcommands:
//!
//! - `polyroute ask` -- Route a query to the best available backend.
//! - `polyroute classify` -- Show which tier a query is classified into.
//! - `polyroute tiers` -- Show configured backends and tier priorities.
//! - `polyroute stats` -- Show per-backend usage statistics.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

/// Multi-provider LLM router with tiered failover.
#[derive(Parser)]
#[command(name = "polyroute", about = "Multi-provider LLM router with tiered failover", version)]
struct Cli {
    /// Enable verbose (debug-level) logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file path (defaults to $POLYROUTE_CONFIG, then ./polyroute.json).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Route a query to the best available backend and print the answer.
    Ask(commands::ask::AskArgs),

    /// Classify a query into a tier without contacting any backend.
    Classify(commands::classify::ClassifyArgs),

    /// Show configured backends and the tier priority table.
    Tiers,

    /// Show per-backend usage statistics from the usage database.
    Stats(commands::stats::StatsArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Ask(args) => commands::ask::run(args, config).await?,
        Commands::Classify(args) => commands::classify::run(args),
        Commands::Tiers => commands::tiers::run(config)?,
        Commands::Stats(args) => commands::stats::run(args, config).await?,
    }

    Ok(())
}
