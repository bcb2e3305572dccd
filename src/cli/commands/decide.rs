use anyhow::{bail, Result};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use crate::approval::{DecisionEvent, DecisionKey, DecisionOutcome, Verdict};

#[derive(Args, Debug)]
pub struct DecideArgs {
    /// Fix ID to decide on
    #[arg(conflicts_with_all = ["pr", "revision"])]
    pub fix: Option<String>,

    /// Decide by change request reference (owner/repo#number)
    #[arg(long)]
    pub pr: Option<String>,

    /// Decide by CMS revision reference
    #[arg(long)]
    pub revision: Option<String>,

    /// Approve the fix and run its commit action
    #[arg(long, conflicts_with = "reject")]
    pub approve: bool,

    /// Reject the fix and discard its artifact
    #[arg(long)]
    pub reject: bool,

    /// Abandon a fix that has not been applied yet (same as --reject)
    #[arg(long, conflicts_with = "approve")]
    pub abandon: bool,

    /// Reviewer name recorded on the decision
    #[arg(long)]
    pub reviewer: Option<String>,

    /// Project directory holding sitefix.yml (defaults to current directory)
    #[arg(long, default_value = ".")]
    pub dir: PathBuf,
}

fn event_for(args: &DecideArgs) -> Result<DecisionEvent> {
    let key = match (&args.fix, &args.pr, &args.revision) {
        (Some(id), None, None) => DecisionKey::Fix(id.clone()),
        (None, Some(pr), None) => DecisionKey::Artifact(pr.clone()),
        (None, None, Some(revision)) => DecisionKey::Artifact(revision.clone()),
        _ => bail!("give exactly one of <fix-id>, --pr, or --revision"),
    };
    let verdict = match (args.approve, args.reject || args.abandon) {
        (true, false) => Verdict::Approve,
        (false, true) => Verdict::Reject,
        _ => bail!("give exactly one of --approve, --reject, or --abandon"),
    };
    Ok(DecisionEvent {
        key,
        verdict,
        reviewer: args.reviewer.clone(),
    })
}

pub async fn execute(args: &DecideArgs) -> Result<()> {
    let event = event_for(args)?;
    let pipeline = super::build(&args.dir)?;
    let outcome = pipeline.queue.decide(event).await?;

    match outcome {
        DecisionOutcome::Applied(ids) => {
            println!("  {} {}", "APPLIED".green(), ids.join(", "));
        }
        DecisionOutcome::CommitFailed(ids) => {
            println!(
                "  {} {} (see tracking tickets for details)",
                "FAILED".red(),
                ids.join(", ")
            );
        }
        DecisionOutcome::Rejected(ids) => {
            println!("  {} {}", "REJECTED".yellow(), ids.join(", "));
        }
        DecisionOutcome::Duplicate => {
            println!("  {} decision already applied, nothing to do", "SKIP".yellow());
        }
        DecisionOutcome::Deferred => {
            println!(
                "  {} batch not complete yet; the decision is recorded and will \
                 apply when the last member is ready",
                "DEFER".cyan()
            );
        }
    }
    Ok(())
}
