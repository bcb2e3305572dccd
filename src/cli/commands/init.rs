use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use crate::core::config::CONFIG_FILE;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Project directory (defaults to current directory)
    #[arg(default_value = ".")]
    pub dir: PathBuf,

    /// Overwrite an existing sitefix.yml
    #[arg(long)]
    pub force: bool,
}

pub async fn execute(args: &InitArgs) -> Result<()> {
    let config_path = args.dir.join(CONFIG_FILE);

    if config_path.exists() && !args.force {
        println!(
            "  {} {} already exists. Use {} to overwrite.",
            "SKIP".yellow(),
            CONFIG_FILE,
            "--force".bold()
        );
        return Ok(());
    }

    std::fs::write(&config_path, default_config())?;
    println!("  {} {} created", "DONE".green(), CONFIG_FILE);
    println!(
        "  Edit {} to configure the CMS, VCS, and tracker channels.",
        config_path.display()
    );

    Ok(())
}

fn default_config() -> &'static str {
    r#"# sitefix configuration

# Where fix records are persisted. Records are never deleted; rejected and
# failed fixes stay available for audit.
store_path: .sitefix/fixes.json

approval:
  # Where decisions come from: dashboard, slack, or cms_moderation
  mode: dashboard
  # Uncomment to auto-approve fixes at or above this confidence
  # auto_approve_threshold: 0.95

# Code-fix channel (branches + pull requests). Token: GITHUB_TOKEN
# vcs:
#   repo: owner/site
#   base_branch: master
#   branch_prefix: fix/site-quality

# Content-fix channel (draft revisions). Token: SITEFIX_CMS_TOKEN
# cms:
#   base_url: https://www.example.com
#   review_state: draft

# Tracking tickets, one per fix
# tracker:
#   repo: owner/site
#   labels: [website-quality]

# Fire-and-forget notifications for proposed/approved/rejected events
# notify:
#   webhook_url: https://hooks.slack.com/services/...

# Combine code fixes sharing a root cause into one change request
batch_code_fixes: true

# Classification rules; leave empty to use the built-in table
rules: []
"#
}
