mod adapters;
mod approval;
mod classifier;
mod cli;
mod core;
mod error;
mod notify;
mod orchestrator;
mod tracker;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Propose(args) => {
            cli::commands::propose::execute(args).await?;
        }
        Commands::Decide(args) => {
            cli::commands::decide::execute(args).await?;
        }
        Commands::Status(args) => {
            cli::commands::status::execute(args).await?;
        }
        Commands::Init(args) => {
            cli::commands::init::execute(args).await?;
        }
    }

    Ok(())
}
