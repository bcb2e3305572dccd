use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use crate::cli::output::{tally, StatusFormatter};
use crate::core::config::Config;
use crate::core::fix::ProposedFix;
use crate::core::store::FixStore;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Batch ID to show (defaults to every recorded fix)
    pub batch: Option<String>,

    /// Output format
    #[arg(long, default_value = "table", value_parser = ["table", "json"])]
    pub format: String,

    /// Project directory holding sitefix.yml (defaults to current directory)
    #[arg(long, default_value = ".")]
    pub dir: PathBuf,
}

pub async fn execute(args: &StatusArgs) -> Result<()> {
    let config = Config::load(&args.dir)?;
    let store = FixStore::open(&args.dir.join(&config.store_path))?;

    let mut fixes: Vec<&ProposedFix> = match &args.batch {
        Some(batch) => store.by_batch(batch),
        None => store.all().collect(),
    };
    if fixes.is_empty() {
        match &args.batch {
            Some(batch) => println!("{}", format!("No fixes in batch {}.", batch).yellow()),
            None => println!("{}", "No fixes recorded.".yellow()),
        }
        return Ok(());
    }
    fixes.sort_by_key(|f| f.created_at);

    let counts = match &args.batch {
        Some(batch) => store.batch_counts(batch),
        None => tally(&fixes),
    };
    StatusFormatter::new(&args.format).display(&fixes, &counts);
    Ok(())
}
