use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use crate::cli::output::StatusFormatter;
use crate::cli::progress::RoutingProgress;
use crate::core::issue::Issue;

#[derive(Args, Debug)]
pub struct ProposeArgs {
    /// JSON file of issues produced by the quality scan
    #[arg(long)]
    pub issues: PathBuf,

    /// Only propose fixes for these issue IDs (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub select: Option<Vec<String>>,

    /// Note shown to reviewers on every created fix (max 1000 characters)
    #[arg(long)]
    pub note: Option<String>,

    /// Scan identifier recorded on the fix records
    #[arg(long, default_value = "adhoc")]
    pub scan: String,

    /// Project directory holding sitefix.yml (defaults to current directory)
    #[arg(long, default_value = ".")]
    pub dir: PathBuf,

    /// Output format
    #[arg(long, default_value = "table", value_parser = ["table", "json"])]
    pub format: String,
}

pub async fn execute(args: &ProposeArgs) -> Result<()> {
    let pipeline = super::build(&args.dir)?;

    let content = std::fs::read_to_string(&args.issues)
        .with_context(|| format!("reading issues file {}", args.issues.display()))?;
    let mut issues: Vec<Issue> = serde_json::from_str(&content)
        .with_context(|| format!("parsing issues file {}", args.issues.display()))?;
    if let Some(select) = &args.select {
        issues.retain(|i| select.contains(&i.id));
    }
    if issues.is_empty() {
        println!("{}", "No issues to propose fixes for.".yellow());
        return Ok(());
    }

    let progress = RoutingProgress::new(issues.len());
    let report = pipeline
        .orchestrator
        .propose(&args.scan, &issues, args.note.clone())
        .await?;
    progress.finish();

    for issue_id in &report.skipped {
        println!(
            "  {} [{}] an active fix already exists",
            "SKIP".yellow(),
            issue_id
        );
    }
    println!(
        "  {} batch {} created ({} fixes)",
        "DONE".green(),
        report.batch_id.bold(),
        report.fix_ids.len()
    );

    let store = pipeline.store.lock().await;
    let mut fixes = store.by_batch(&report.batch_id);
    fixes.sort_by_key(|f| f.created_at);
    let counts = store.batch_counts(&report.batch_id);
    StatusFormatter::new(&args.format).display(&fixes, &counts);

    Ok(())
}
