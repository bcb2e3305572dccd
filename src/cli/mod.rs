pub mod commands;
pub mod output;
pub mod progress;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "sitefix",
    version,
    about = "Classify website quality issues and drive fixes through review"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Classify issues and route them into reviewable fixes
    Propose(commands::propose::ProposeArgs),
    /// Approve or reject a proposed fix
    Decide(commands::decide::DecideArgs),
    /// Show fix and batch status
    Status(commands::status::StatusArgs),
    /// Write a default sitefix.yml
    Init(commands::init::InitArgs),
}
