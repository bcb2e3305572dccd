use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::classifier::rules::RuleSpec;

pub const CONFIG_FILE: &str = "sitefix.yml";

/// Where approval decisions come from. Purely informational for ticket and
/// notification text; decisions always arrive through the `decide` command
/// regardless of the channel humans use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalMode {
    Slack,
    #[default]
    Dashboard,
    CmsModeration,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApprovalConfig {
    #[serde(default)]
    pub mode: ApprovalMode,
    /// Fixes at or above this confidence skip human review and are approved
    /// by a synthetic system decision the moment their artifact is ready.
    #[serde(default)]
    pub auto_approve_threshold: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VcsConfig {
    /// "owner/repo" on the configured host.
    pub repo: String,
    /// Base branch for fix branches and change requests. `None` uses the
    /// repository default.
    #[serde(default)]
    pub base_branch: Option<String>,
    #[serde(default = "default_branch_prefix")]
    pub branch_prefix: String,
}

fn default_branch_prefix() -> String {
    "fix/site-quality".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CmsConfig {
    pub base_url: String,
    /// Editorial moderation state for draft revisions. Never "published":
    /// the adapter only ever writes non-published revisions.
    #[serde(default = "default_review_state")]
    pub review_state: String,
}

fn default_review_state() -> String {
    "draft".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// "owner/repo" receiving tracking tickets.
    pub repo: String,
    #[serde(default)]
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifyConfig {
    #[serde(default)]
    pub webhook_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,
    #[serde(default)]
    pub approval: ApprovalConfig,
    #[serde(default)]
    pub vcs: Option<VcsConfig>,
    #[serde(default)]
    pub cms: Option<CmsConfig>,
    #[serde(default)]
    pub tracker: Option<TrackerConfig>,
    #[serde(default)]
    pub notify: NotifyConfig,
    /// Combine code fixes sharing a root-cause signature into one change
    /// request.
    #[serde(default = "default_true")]
    pub batch_code_fixes: bool,
    #[serde(default)]
    pub rules: Vec<RuleSpec>,
}

fn default_store_path() -> PathBuf {
    PathBuf::from(".sitefix/fixes.json")
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
            approval: ApprovalConfig::default(),
            vcs: None,
            cms: None,
            tracker: None,
            notify: NotifyConfig::default(),
            batch_code_fixes: true,
            rules: Vec::new(),
        }
    }
}

impl Config {
    /// Load `sitefix.yml` from the given directory, or defaults when absent.
    /// A malformed file is an error, not a silent fallback.
    pub fn load(dir: &Path) -> Result<Self> {
        let config_path = dir.join(CONFIG_FILE);
        if !config_path.exists() {
            return Ok(Config::default());
        }
        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("reading {}", config_path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("parsing {}", config_path.display()))?;
        if let Some(threshold) = config.approval.auto_approve_threshold {
            anyhow::ensure!(
                (0.0..=1.0).contains(&threshold),
                "auto_approve_threshold must be within 0.0..=1.0, got {}",
                threshold
            );
        }
        Ok(config)
    }

    pub fn vcs_token() -> Option<String> {
        std::env::var("GITHUB_TOKEN").ok()
    }

    pub fn cms_token() -> Option<String> {
        std::env::var("SITEFIX_CMS_TOKEN").ok()
    }
}
