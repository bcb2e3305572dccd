use anyhow::Result;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::adapters::code::CodeFixAdapter;
use crate::adapters::content::ContentFixAdapter;
use crate::approval::ApprovalQueue;
use crate::classifier::{Classification, Classifier};
use crate::core::fix::{Actor, FixStatus, FixType, ProposedFix};
use crate::core::issue::Issue;
use crate::core::store::FixStore;
use crate::error::FixError;
use crate::notify::{dispatch, Notifier, NotifyEvent};
use crate::tracker::{artifact_comment, failure_comment, ticket_for_fix, TicketTracker};

/// Summary of one `propose` invocation.
#[derive(Debug, Default, Clone)]
pub struct ProposalReport {
    pub batch_id: String,
    pub fix_ids: Vec<String>,
    pub manual: usize,
    pub not_fixable: usize,
    /// Issue ids skipped because an active fix already exists.
    pub skipped: Vec<String>,
}

/// Drives issues from classification through routing to a reviewable
/// artifact, handing each fix to the approval queue once its artifact
/// exists.
pub struct Orchestrator {
    store: Arc<Mutex<FixStore>>,
    classifier: Classifier,
    content: Option<Arc<ContentFixAdapter>>,
    code: Option<Arc<CodeFixAdapter>>,
    tracker: Option<Arc<dyn TicketTracker>>,
    notifier: Arc<dyn Notifier>,
    queue: Arc<ApprovalQueue>,
    tracker_labels: Vec<String>,
    batch_code_fixes: bool,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<Mutex<FixStore>>,
        classifier: Classifier,
        content: Option<Arc<ContentFixAdapter>>,
        code: Option<Arc<CodeFixAdapter>>,
        tracker: Option<Arc<dyn TicketTracker>>,
        notifier: Arc<dyn Notifier>,
        queue: Arc<ApprovalQueue>,
        tracker_labels: Vec<String>,
        batch_code_fixes: bool,
    ) -> Self {
        Self {
            store,
            classifier,
            content,
            code,
            tracker,
            notifier,
            queue,
            tracker_labels,
            batch_code_fixes,
        }
    }

    /// Classify every issue, create fix records sharing one batch id, and
    /// route the fixable ones through their adapters.
    pub async fn propose(
        self: &Arc<Self>,
        scan_id: &str,
        issues: &[Issue],
        user_note: Option<String>,
    ) -> Result<ProposalReport> {
        let batch_id = Uuid::new_v4().to_string();
        let mut report = ProposalReport {
            batch_id: batch_id.clone(),
            ..Default::default()
        };
        let mut routed: Vec<(String, Classification)> = Vec::new();
        let mut seq = 0usize;

        for issue in issues {
            {
                let store = self.store.lock().await;
                if let Some(active) = store.active_fix_for_issue(&issue.id) {
                    warn!(
                        issue = %issue.id,
                        fix = %active.id,
                        status = %active.status,
                        "skipping issue with an active fix"
                    );
                    report.skipped.push(issue.id.clone());
                    continue;
                }
            }

            seq += 1;
            let fix_id = format!("{}-{}", &batch_id[..8], seq);
            let classification = self.classifier.classify(issue);
            debug!(
                issue = %issue.id,
                fix_type = %classification.fix_type,
                confidence = classification.confidence,
                "classified issue"
            );

            let fix = ProposedFix::new(
                fix_id.clone(),
                issue,
                scan_id.to_string(),
                batch_id.clone(),
                classification.fix_type,
                classification.confidence,
                classification.rationale.clone(),
                user_note.clone(),
            )?;
            {
                let mut store = self.store.lock().await;
                store.insert(fix.clone())?;
            }
            report.fix_ids.push(fix_id.clone());

            if let Some(tracker) = &self.tracker {
                let ticket = ticket_for_fix(&fix, &self.tracker_labels);
                match tracker.create_ticket(&ticket).await {
                    Ok(reference) => {
                        let mut store = self.store.lock().await;
                        if let Err(e) = store.modify(&fix_id, |f| {
                            f.ticket_reference = Some(reference.clone());
                            Ok(())
                        }) {
                            warn!(fix = %fix_id, error = %e, "could not record ticket reference");
                        }
                    }
                    Err(e) => warn!(fix = %fix_id, error = %e, "could not create tracking ticket"),
                }
            }
            dispatch(self.notifier.as_ref(), NotifyEvent::proposed(&fix)).await;

            if classification.fix_type.is_fixable() {
                let mut store = self.store.lock().await;
                store.modify(&fix_id, |f| {
                    f.transition(FixStatus::Routed, Actor::System, None)
                })?;
                routed.push((fix_id, classification));
            } else {
                let mut store = self.store.lock().await;
                store.modify(&fix_id, |f| {
                    f.transition(
                        FixStatus::Manual,
                        Actor::System,
                        Some(classification.rationale.clone()),
                    )
                })?;
                match classification.fix_type {
                    FixType::NotFixable => report.not_fixable += 1,
                    _ => report.manual += 1,
                }
            }
        }

        let (singles, groups) = self.plan_routing(routed);
        let mut set = JoinSet::new();
        for fix_id in singles {
            let this = self.clone();
            set.spawn(async move { this.execute_single(fix_id).await });
        }
        for (signature, ids) in groups {
            let this = self.clone();
            set.spawn(async move { this.execute_batch(ids, signature).await });
        }
        while let Some(joined) = set.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "routing task panicked");
            }
        }

        info!(
            batch = %batch_id,
            fixes = report.fix_ids.len(),
            skipped = report.skipped.len(),
            "batch proposed"
        );
        Ok(report)
    }

    /// Split routed fixes into individual runs and root-cause groups. Code
    /// fixes sharing a rule signature land in one change request when
    /// batching is enabled; a group of one degrades to an individual run.
    fn plan_routing(
        &self,
        routed: Vec<(String, Classification)>,
    ) -> (Vec<String>, Vec<(String, Vec<String>)>) {
        let mut singles = Vec::new();
        let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (fix_id, classification) in routed {
            match (classification.fix_type, &classification.signature) {
                (FixType::CodeFix, Some(signature)) if self.batch_code_fixes => {
                    grouped.entry(signature.clone()).or_default().push(fix_id);
                }
                _ => singles.push(fix_id),
            }
        }
        let mut groups = Vec::new();
        for (signature, ids) in grouped {
            if ids.len() == 1 {
                singles.extend(ids);
            } else {
                groups.push((signature, ids));
            }
        }
        (singles, groups)
    }

    async fn execute_single(&self, fix_id: String) {
        let fix = {
            let store = self.store.lock().await;
            store.get(&fix_id).cloned()
        };
        let Some(fix) = fix else {
            warn!(fix = %fix_id, "fix disappeared before routing");
            return;
        };

        let outcome: Result<(), FixError> = match fix.fix_type {
            FixType::ContentFix => match &self.content {
                None => Err(FixError::CmsAccess("CMS is not configured".to_string())),
                Some(content) => match content.propose(&fix).await {
                    Ok(revision) => {
                        let mut store = self.store.lock().await;
                        store
                            .modify(&fix_id, |f| f.attach_revision(revision.clone()))
                            .map(|_| ())
                    }
                    Err(e) => Err(e),
                },
            },
            FixType::CodeFix => match &self.code {
                None => Err(FixError::RepositoryAccess(
                    "VCS is not configured".to_string(),
                )),
                Some(code) => match code.propose(&fix).await {
                    Ok(pr) => {
                        let mut store = self.store.lock().await;
                        store
                            .modify(&fix_id, |f| f.attach_change_request(pr.clone()))
                            .map(|_| ())
                    }
                    Err(e) => Err(e),
                },
            },
            _ => return,
        };

        let ids = vec![fix_id];
        match outcome {
            Ok(()) => self.after_artifact(&ids).await,
            Err(error) => self.fail_routing(&ids, error).await,
        }
    }

    async fn execute_batch(&self, ids: Vec<String>, signature: String) {
        let fixes: Vec<ProposedFix> = {
            let store = self.store.lock().await;
            ids.iter().filter_map(|id| store.get(id).cloned()).collect()
        };
        let Some(code) = &self.code else {
            return self
                .fail_routing(
                    &ids,
                    FixError::RepositoryAccess("VCS is not configured".to_string()),
                )
                .await;
        };

        match code.propose_batch(&fixes, &signature).await {
            Ok(pr) => {
                let attached = {
                    let mut store = self.store.lock().await;
                    store.modify_many(&ids, |f| f.attach_change_request(pr.clone()))
                };
                match attached {
                    Ok(_) => self.after_artifact(&ids).await,
                    Err(e) => warn!(batch = ?ids, error = %e, "could not attach change request"),
                }
            }
            Err(error) => self.fail_routing(&ids, error).await,
        }
    }

    /// Post the artifact comment and hand each fix to the approval queue,
    /// which applies the auto-approve guard and replays deferred decisions.
    async fn after_artifact(&self, ids: &[String]) {
        for fix_id in ids {
            let fix = {
                let store = self.store.lock().await;
                store.get(fix_id).cloned()
            };
            let Some(fix) = fix else { continue };
            if let (Some(tracker), Some(ticket)) = (&self.tracker, &fix.ticket_reference) {
                if let Err(e) = tracker.comment(ticket, &artifact_comment(&fix)).await {
                    warn!(fix = %fix_id, error = %e, "could not post artifact comment");
                }
            }
            if let Err(e) = self.queue.admit(fix_id).await {
                warn!(fix = %fix_id, error = %e, "approval admission failed");
            }
        }
    }

    async fn fail_routing(&self, ids: &[String], error: FixError) {
        warn!(fixes = ?ids, error = %error, "routing failed");
        let failed = {
            let mut store = self.store.lock().await;
            store.modify_many(ids, |f| {
                f.transition(
                    FixStatus::Failed,
                    Actor::System,
                    Some(format!("{}: {}", error.kind(), error)),
                )
            })
        };
        let Ok(failed) = failed else {
            warn!(fixes = ?ids, "could not record routing failure");
            return;
        };
        if let Some(tracker) = &self.tracker {
            for fix in &failed {
                if let Some(ticket) = &fix.ticket_reference {
                    let comment = failure_comment(fix, &error);
                    if let Err(e) = tracker.comment(ticket, &comment).await {
                        warn!(fix = %fix.id, error = %e, "could not post failure comment");
                    }
                }
            }
        }
    }
}
