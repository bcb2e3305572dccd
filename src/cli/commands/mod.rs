pub mod decide;
pub mod init;
pub mod propose;
pub mod status;

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::adapters::code::CodeFixAdapter;
use crate::adapters::content::ContentFixAdapter;
use crate::adapters::drupal::DrupalCms;
use crate::adapters::github::GitHubHost;
use crate::adapters::traits::{CmsClient, VcsHost};
use crate::approval::ApprovalQueue;
use crate::classifier::rules::RuleTable;
use crate::classifier::Classifier;
use crate::core::config::Config;
use crate::core::store::FixStore;
use crate::notify::{Notifier, WebhookNotifier};
use crate::orchestrator::Orchestrator;
use crate::tracker::TicketTracker;

/// Everything a subcommand needs, wired from `sitefix.yml` in the project
/// directory. Channels without configuration stay unwired; fixes needing
/// them fail with a configuration error instead of silently passing.
pub struct Pipeline {
    pub store: Arc<Mutex<FixStore>>,
    pub queue: Arc<ApprovalQueue>,
    pub orchestrator: Arc<Orchestrator>,
}

pub fn build(dir: &Path) -> Result<Pipeline> {
    let config = Config::load(dir)?;
    let store = Arc::new(Mutex::new(FixStore::open(&dir.join(&config.store_path))?));

    let content = config.cms.as_ref().map(|cms| {
        let client = Arc::new(DrupalCms::new(
            cms.base_url.clone(),
            Config::cms_token(),
            cms.review_state.clone(),
        )) as Arc<dyn CmsClient>;
        Arc::new(ContentFixAdapter::new(client))
    });
    let code = config.vcs.as_ref().map(|vcs| {
        let host =
            Arc::new(GitHubHost::new(vcs.repo.clone(), Config::vcs_token())) as Arc<dyn VcsHost>;
        Arc::new(CodeFixAdapter::new(
            host,
            vcs.base_branch.clone(),
            vcs.branch_prefix.clone(),
        ))
    });
    let tracker = config.tracker.as_ref().map(|tracker| {
        Arc::new(GitHubHost::new(tracker.repo.clone(), Config::vcs_token()))
            as Arc<dyn TicketTracker>
    });
    let notifier: Arc<dyn Notifier> =
        Arc::new(WebhookNotifier::new(config.notify.webhook_url.clone()));

    let queue = Arc::new(ApprovalQueue::new(
        store.clone(),
        content.clone(),
        code.clone(),
        tracker.clone(),
        notifier.clone(),
        config.approval.clone(),
    ));
    let classifier = Classifier::new(RuleTable::from_config(&config.rules)?);
    let labels = config
        .tracker
        .as_ref()
        .map(|t| t.labels.clone())
        .unwrap_or_default();
    let orchestrator = Arc::new(Orchestrator::new(
        store.clone(),
        classifier,
        content,
        code,
        tracker,
        notifier,
        queue.clone(),
        labels,
        config.batch_code_fixes,
    ));

    Ok(Pipeline {
        store,
        queue,
        orchestrator,
    })
}
