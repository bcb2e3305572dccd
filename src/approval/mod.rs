use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::adapters::code::CodeFixAdapter;
use crate::adapters::content::ContentFixAdapter;
use crate::core::config::ApprovalConfig;
use crate::core::fix::{Actor, FixStatus, ProposedFix};
use crate::core::store::FixStore;
use crate::error::FixError;
use crate::notify::{dispatch, Notifier, NotifyEvent};
use crate::tracker::{failure_comment, rejection_comment, TicketTracker};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Approve,
    Reject,
}

/// How a decision event identifies its target: a fix record directly, or
/// the external artifact (revision or change request reference) a webhook
/// knows about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "by", content = "value")]
pub enum DecisionKey {
    Fix(String),
    Artifact(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionEvent {
    pub key: DecisionKey,
    pub verdict: Verdict,
    pub reviewer: Option<String>,
}

impl DecisionEvent {
    pub fn artifact_reference(&self) -> Option<&str> {
        match &self.key {
            DecisionKey::Artifact(reference) => Some(reference),
            DecisionKey::Fix(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecisionOutcome {
    /// Commit action succeeded; these fixes are applied and their tickets
    /// closed.
    Applied(Vec<String>),
    /// Commit action failed; these fixes are terminal at `failed`.
    CommitFailed(Vec<String>),
    Rejected(Vec<String>),
    /// Same terminal decision delivered again: no-op.
    Duplicate,
    /// Batch members are still being routed; the event is parked until the
    /// last member reaches awaiting_approval.
    Deferred,
}

/// The single place external approval/rejection signals enter the pipeline
/// and drive terminal transitions.
pub struct ApprovalQueue {
    store: Arc<Mutex<FixStore>>,
    content: Option<Arc<ContentFixAdapter>>,
    code: Option<Arc<CodeFixAdapter>>,
    tracker: Option<Arc<dyn TicketTracker>>,
    notifier: Arc<dyn Notifier>,
    config: ApprovalConfig,
}

impl ApprovalQueue {
    pub fn new(
        store: Arc<Mutex<FixStore>>,
        content: Option<Arc<ContentFixAdapter>>,
        code: Option<Arc<CodeFixAdapter>>,
        tracker: Option<Arc<dyn TicketTracker>>,
        notifier: Arc<dyn Notifier>,
        config: ApprovalConfig,
    ) -> Self {
        Self {
            store,
            content,
            code,
            tracker,
            notifier,
            config,
        }
    }

    /// Called when a fix's artifact is ready. Applies the auto-approve
    /// guard and replays any decision that arrived before the batch was
    /// complete.
    pub async fn admit(&self, fix_id: &str) -> Result<(), FixError> {
        let (confidence, artifact) = {
            let store = self.store.lock().await;
            let fix = store
                .get(fix_id)
                .ok_or_else(|| FixError::UnknownFix(fix_id.to_string()))?;
            (
                fix.confidence,
                fix.artifact_reference().map(str::to_string),
            )
        };

        if let Some(reference) = &artifact {
            let deferred = {
                let mut store = self.store.lock().await;
                store
                    .take_deferred_for(reference)
                    .map_err(|e| FixError::TrackerAccess(e.to_string()))?
            };
            for event in deferred {
                debug!(fix = fix_id, "replaying deferred decision");
                // decide() re-defers the event if the batch is still
                // incomplete
                self.decide(event).await?;
            }
        }

        if let Some(threshold) = self.config.auto_approve_threshold {
            let still_awaiting = {
                let store = self.store.lock().await;
                store
                    .get(fix_id)
                    .map(|f| f.status == FixStatus::AwaitingApproval)
                    .unwrap_or(false)
            };
            if still_awaiting && confidence >= threshold {
                info!(fix = fix_id, confidence, "auto-approving high-confidence fix");
                self.decide(DecisionEvent {
                    key: DecisionKey::Fix(fix_id.to_string()),
                    verdict: Verdict::Approve,
                    reviewer: None,
                })
                .await?;
            }
        }
        Ok(())
    }

    /// Resolve one decision event to its terminal transitions.
    pub async fn decide(&self, event: DecisionEvent) -> Result<DecisionOutcome, FixError> {
        let members = self.resolve_members(&event).await?;
        let statuses: Vec<FixStatus> = members.iter().map(|f| f.status).collect();

        // duplicate delivery of an already-applied decision is a no-op
        if statuses.iter().all(|s| s.is_terminal()) {
            let consistent = members.iter().all(|f| match event.verdict {
                Verdict::Approve => {
                    matches!(f.status, FixStatus::Applied | FixStatus::Failed)
                }
                Verdict::Reject => matches!(f.status, FixStatus::Rejected),
            });
            if consistent {
                debug!(?event, "duplicate decision event ignored");
                return Ok(DecisionOutcome::Duplicate);
            }
            return Err(FixError::DuplicateDecision(members[0].id.clone()));
        }

        // a batch decision may arrive before every member has its artifact;
        // park it until the last member is ready
        if matches!(event.key, DecisionKey::Artifact(_))
            && statuses
                .iter()
                .any(|s| matches!(s, FixStatus::Pending | FixStatus::Routed))
        {
            debug!(?event, "batch incomplete, deferring decision");
            let mut store = self.store.lock().await;
            store
                .push_deferred(event)
                .map_err(|e| FixError::TrackerAccess(e.to_string()))?;
            return Ok(DecisionOutcome::Deferred);
        }

        let actor = match &event.reviewer {
            Some(name) => Actor::Reviewer(name.clone()),
            None => Actor::System,
        };
        match event.verdict {
            Verdict::Approve => self.approve(members, actor).await,
            Verdict::Reject => self.reject(members, actor).await,
        }
    }

    async fn resolve_members(&self, event: &DecisionEvent) -> Result<Vec<ProposedFix>, FixError> {
        let store = self.store.lock().await;
        let members: Vec<ProposedFix> = match &event.key {
            DecisionKey::Fix(id) => {
                let fix = store
                    .get(id)
                    .ok_or_else(|| FixError::UnknownFix(id.clone()))?;
                // a merge decision covers every record sharing the change
                // request
                match &fix.pr_reference {
                    Some(pr) => store.by_artifact(pr).into_iter().cloned().collect(),
                    None => vec![fix.clone()],
                }
            }
            DecisionKey::Artifact(reference) => {
                let members: Vec<ProposedFix> =
                    store.by_artifact(reference).into_iter().cloned().collect();
                if members.is_empty() {
                    return Err(FixError::UnknownArtifact(reference.clone()));
                }
                members
            }
        };
        Ok(members)
    }

    async fn approve(
        &self,
        members: Vec<ProposedFix>,
        actor: Actor,
    ) -> Result<DecisionOutcome, FixError> {
        let ids: Vec<String> = members.iter().map(|f| f.id.clone()).collect();
        let approved = {
            let mut store = self.store.lock().await;
            // re-check under the lock: a concurrent event may have settled
            // these records after the snapshot was taken
            let settled = ids.iter().all(|id| {
                store
                    .get(id)
                    .map(|f| {
                        matches!(
                            f.status,
                            FixStatus::Approved | FixStatus::Applied | FixStatus::Failed
                        )
                    })
                    .unwrap_or(false)
            });
            if settled {
                debug!(fixes = ?ids, "already approved by a concurrent event");
                return Ok(DecisionOutcome::Duplicate);
            }
            store.modify_many(&ids, |fix| {
                fix.transition(FixStatus::Approved, actor.clone(), None)
            })?
        };
        let reviewer = actor.to_string();
        for fix in &approved {
            dispatch(self.notifier.as_ref(), NotifyEvent::approved(fix, &reviewer)).await;
        }

        // commit action: publish the revision or merge the shared change
        // request exactly once. Runs to a definite outcome; no cancellation
        // past this point.
        let commit_result = self.commit(&approved[0]).await;

        match commit_result {
            Ok(()) => {
                let applied = {
                    let mut store = self.store.lock().await;
                    store.modify_many(&ids, |fix| {
                        fix.transition(FixStatus::Applied, Actor::System, None)
                    })?
                };
                if let Some(tracker) = &self.tracker {
                    for fix in &applied {
                        if let Some(ticket) = &fix.ticket_reference {
                            if let Err(e) = tracker.close(ticket).await {
                                warn!(fix = %fix.id, error = %e, "could not close tracking ticket");
                            }
                        }
                    }
                }
                info!(fixes = ?ids, "fixes applied");
                Ok(DecisionOutcome::Applied(ids))
            }
            Err(error) => {
                let failed = {
                    let mut store = self.store.lock().await;
                    store.modify_many(&ids, |fix| {
                        fix.transition(
                            FixStatus::Failed,
                            Actor::System,
                            Some(format!("{}: {}", error.kind(), error)),
                        )
                    })?
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
                warn!(fixes = ?ids, error = %error, "commit action failed");
                Ok(DecisionOutcome::CommitFailed(ids))
            }
        }
    }

    async fn reject(
        &self,
        members: Vec<ProposedFix>,
        actor: Actor,
    ) -> Result<DecisionOutcome, FixError> {
        let ids: Vec<String> = members.iter().map(|f| f.id.clone()).collect();
        let rejected = {
            let mut store = self.store.lock().await;
            let settled = ids.iter().all(|id| {
                store
                    .get(id)
                    .map(|f| f.status == FixStatus::Rejected)
                    .unwrap_or(false)
            });
            if settled {
                debug!(fixes = ?ids, "already rejected by a concurrent event");
                return Ok(DecisionOutcome::Duplicate);
            }
            store.modify_many(&ids, |fix| {
                fix.transition(FixStatus::Rejected, actor.clone(), None)
            })?
        };

        // discard the artifact; a failure here is logged, the rejection
        // itself already happened
        if let Some(fix) = rejected.first() {
            if let Err(e) = self.discard_artifact(fix).await {
                warn!(fix = %fix.id, error = %e, "could not discard artifact");
            }
        }

        let reviewer = actor.to_string();
        for fix in &rejected {
            if let (Some(tracker), Some(ticket)) = (&self.tracker, &fix.ticket_reference) {
                let comment = rejection_comment(fix, &reviewer);
                if let Err(e) = tracker.comment(ticket, &comment).await {
                    warn!(fix = %fix.id, error = %e, "could not post rejection comment");
                }
            }
            dispatch(self.notifier.as_ref(), NotifyEvent::rejected(fix, &reviewer)).await;
        }
        info!(fixes = ?ids, "fixes rejected");
        Ok(DecisionOutcome::Rejected(ids))
    }

    async fn commit(&self, fix: &ProposedFix) -> Result<(), FixError> {
        if let Some(revision) = &fix.revision_reference {
            let content = self
                .content
                .as_ref()
                .ok_or_else(|| FixError::CmsAccess("CMS is not configured".to_string()))?;
            content.publish(revision).await
        } else if let Some(pr) = &fix.pr_reference {
            let code = self
                .code
                .as_ref()
                .ok_or_else(|| FixError::RepositoryAccess("VCS is not configured".to_string()))?;
            code.merge(pr).await
        } else {
            Err(FixError::InvalidTransition {
                from: fix.status,
                to: FixStatus::Applied,
            })
        }
    }

    async fn discard_artifact(&self, fix: &ProposedFix) -> Result<(), FixError> {
        if let Some(revision) = &fix.revision_reference {
            if let Some(content) = &self.content {
                return content.discard(revision).await;
            }
        } else if let Some(pr) = &fix.pr_reference {
            if let Some(code) = &self.code {
                return code.close(pr).await;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::fakes::{InMemoryCms, InMemoryVcs, RecordingNotifier, RecordingTracker};
    use crate::core::fix::{FixType, ProposedFix};
    use crate::core::issue::{Issue, Severity};
    use tempfile::TempDir;

    struct Harness {
        queue: ApprovalQueue,
        store: Arc<Mutex<FixStore>>,
        cms: Arc<InMemoryCms>,
        vcs: Arc<InMemoryVcs>,
        tracker: Arc<RecordingTracker>,
        _tmp: TempDir,
    }

    fn make_harness(config: ApprovalConfig) -> Harness {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(Mutex::new(
            FixStore::open(&tmp.path().join("fixes.json")).unwrap(),
        ));
        let cms = Arc::new(InMemoryCms::default());
        let vcs = Arc::new(InMemoryVcs::new("master"));
        let tracker = Arc::new(RecordingTracker::default());
        let queue = ApprovalQueue::new(
            store.clone(),
            Some(Arc::new(ContentFixAdapter::new(cms.clone()))),
            Some(Arc::new(CodeFixAdapter::new(
                vcs.clone(),
                None,
                "fix/site-quality".to_string(),
            ))),
            Some(tracker.clone() as Arc<dyn TicketTracker>),
            Arc::new(RecordingNotifier::default()),
            config,
        );
        Harness {
            queue,
            store,
            cms,
            vcs,
            tracker,
            _tmp: tmp,
        }
    }

    fn make_fix(id: &str, issue_id: &str, fix_type: FixType, confidence: f32) -> ProposedFix {
        let issue = Issue {
            id: issue_id.to_string(),
            category: "accessibility".to_string(),
            severity: Severity::High,
            title: "Image missing alt text".to_string(),
            description: String::new(),
            recommendation: None,
            url: "https://example.com/about".to_string(),
            element: None,
        };
        ProposedFix::new(
            id.to_string(),
            &issue,
            "scan-1".to_string(),
            "b1".to_string(),
            fix_type,
            confidence,
            "rule matched".to_string(),
            None,
        )
        .unwrap()
    }

    async fn insert_awaiting_content_fix(h: &Harness, id: &str, issue_id: &str) -> String {
        use crate::adapters::traits::{CmsClient, RevisionRequest};

        h.cms.add_entity("cms-node", "node-7", "body text");
        let request = RevisionRequest {
            entity_id: "node-7".to_string(),
            field_name: "alt".to_string(),
            original: None,
            proposed: "new alt".to_string(),
            log_message: String::new(),
        };
        let revision = h.cms.create_draft_revision(&request).await.unwrap();

        let mut store = h.store.lock().await;
        let mut fix = make_fix(id, issue_id, FixType::ContentFix, 0.9);
        fix.proposed_value = Some("new alt".to_string());
        fix.ticket_reference = Some("ticket-1".to_string());
        store.insert(fix).unwrap();
        store
            .modify(id, |f| f.transition(FixStatus::Routed, Actor::System, None))
            .unwrap();
        store
            .modify(id, |f| f.attach_revision(revision.clone()))
            .unwrap();
        revision
    }

    async fn open_request(h: &Harness) -> String {
        use crate::adapters::traits::{ChangeRequest, VcsHost};
        h.vcs
            .open_change_request(&ChangeRequest {
                title: "[Fix] Image missing alt text".to_string(),
                body: String::new(),
                head: "fix/site-quality/b1".to_string(),
                base: "master".to_string(),
            })
            .await
            .unwrap()
    }

    async fn insert_awaiting_code_fixes(h: &Harness, ids: &[(&str, &str)]) -> String {
        let pr = open_request(h).await;
        let mut store = h.store.lock().await;
        for (id, issue_id) in ids {
            let mut fix = make_fix(id, issue_id, FixType::CodeFix, 0.8);
            fix.ticket_reference = Some(format!("ticket-{}", id));
            store.insert(fix).unwrap();
            store
                .modify(id, |f| f.transition(FixStatus::Routed, Actor::System, None))
                .unwrap();
            store
                .modify(id, |f| f.attach_change_request(pr.clone()))
                .unwrap();
        }
        pr
    }

    #[tokio::test]
    async fn test_approval_publishes_and_closes_ticket() {
        let h = make_harness(ApprovalConfig::default());
        let revision = insert_awaiting_content_fix(&h, "b1-1", "ACC-001").await;

        let outcome = h
            .queue
            .decide(DecisionEvent {
                key: DecisionKey::Fix("b1-1".to_string()),
                verdict: Verdict::Approve,
                reviewer: Some("jamie".to_string()),
            })
            .await
            .unwrap();

        assert_eq!(outcome, DecisionOutcome::Applied(vec!["b1-1".to_string()]));
        assert!(h.cms.is_published(&revision));
        assert!(h.tracker.is_closed("ticket-1"));
        let store = h.store.lock().await;
        let fix = store.get("b1-1").unwrap();
        assert_eq!(fix.status, FixStatus::Applied);
        assert_eq!(fix.reviewed_by.as_deref(), Some("reviewer:jamie"));
    }

    #[tokio::test]
    async fn test_duplicate_approval_is_noop() {
        let h = make_harness(ApprovalConfig::default());
        insert_awaiting_content_fix(&h, "b1-1", "ACC-001").await;

        let event = DecisionEvent {
            key: DecisionKey::Fix("b1-1".to_string()),
            verdict: Verdict::Approve,
            reviewer: Some("jamie".to_string()),
        };
        h.queue.decide(event.clone()).await.unwrap();
        assert_eq!(h.cms.revision_count(), 1);

        let second = h.queue.decide(event).await.unwrap();
        assert_eq!(second, DecisionOutcome::Duplicate);
        // no second commit action happened
        assert_eq!(h.cms.revision_count(), 1);
    }

    #[tokio::test]
    async fn test_stale_concurrent_decision_is_still_a_noop() {
        let h = make_harness(ApprovalConfig::default());
        let revision = insert_awaiting_content_fix(&h, "b1-1", "ACC-001").await;

        let event = DecisionEvent {
            key: DecisionKey::Fix("b1-1".to_string()),
            verdict: Verdict::Approve,
            reviewer: Some("jamie".to_string()),
        };
        // a second event resolving concurrently snapshots the record before
        // the first transition lands
        let stale = h.queue.resolve_members(&event).await.unwrap();
        h.queue.decide(event).await.unwrap();

        let second = h
            .queue
            .approve(stale, Actor::Reviewer("sam".to_string()))
            .await
            .unwrap();
        assert_eq!(second, DecisionOutcome::Duplicate);
        assert!(h.cms.is_published(&revision));
        let store = h.store.lock().await;
        let fix = store.get("b1-1").unwrap();
        assert_eq!(fix.status, FixStatus::Applied);
        // the first reviewer's decision stands
        assert_eq!(fix.reviewed_by.as_deref(), Some("reviewer:jamie"));
    }

    #[tokio::test]
    async fn test_rejection_discards_draft_and_keeps_ticket_open() {
        let h = make_harness(ApprovalConfig::default());
        let revision = insert_awaiting_content_fix(&h, "b1-1", "ACC-001").await;

        let outcome = h
            .queue
            .decide(DecisionEvent {
                key: DecisionKey::Artifact(revision.clone()),
                verdict: Verdict::Reject,
                reviewer: Some("sam".to_string()),
            })
            .await
            .unwrap();

        assert_eq!(outcome, DecisionOutcome::Rejected(vec!["b1-1".to_string()]));
        assert!(h.cms.is_discarded(&revision));
        assert!(!h.tracker.is_closed("ticket-1"));
        let comments = h.tracker.comments_for("ticket-1");
        assert_eq!(comments.len(), 1);
        assert!(comments[0].contains("rejected"));
    }

    #[tokio::test]
    async fn test_batch_merge_resolves_all_members_together() {
        let h = make_harness(ApprovalConfig::default());
        let pr = insert_awaiting_code_fixes(
            &h,
            &[("b1-1", "ACC-001"), ("b1-2", "ACC-002"), ("b1-3", "ACC-003")],
        )
        .await;

        let outcome = h
            .queue
            .decide(DecisionEvent {
                key: DecisionKey::Artifact(pr.clone()),
                verdict: Verdict::Approve,
                reviewer: Some("jamie".to_string()),
            })
            .await
            .unwrap();

        match outcome {
            DecisionOutcome::Applied(ids) => assert_eq!(ids.len(), 3),
            other => panic!("expected Applied, got {:?}", other),
        }
        // single merge for the shared change request
        assert!(h.vcs.is_merged(&pr));
        assert_eq!(h.vcs.merged_count(), 1);
        let store = h.store.lock().await;
        for id in ["b1-1", "b1-2", "b1-3"] {
            assert_eq!(store.get(id).unwrap().status, FixStatus::Applied);
        }
    }

    #[tokio::test]
    async fn test_rejected_code_fix_closes_request_without_merging() {
        let h = make_harness(ApprovalConfig::default());
        let pr = insert_awaiting_code_fixes(&h, &[("b1-1", "ACC-001")]).await;

        let outcome = h
            .queue
            .decide(DecisionEvent {
                key: DecisionKey::Fix("b1-1".to_string()),
                verdict: Verdict::Reject,
                reviewer: Some("sam".to_string()),
            })
            .await
            .unwrap();

        assert_eq!(outcome, DecisionOutcome::Rejected(vec!["b1-1".to_string()]));
        assert!(h.vcs.is_closed(&pr));
        assert!(!h.vcs.is_merged(&pr));
    }

    #[tokio::test]
    async fn test_member_decision_covers_whole_batch() {
        let h = make_harness(ApprovalConfig::default());
        insert_awaiting_code_fixes(&h, &[("b1-1", "ACC-001"), ("b1-2", "ACC-002")]).await;

        let outcome = h
            .queue
            .decide(DecisionEvent {
                key: DecisionKey::Fix("b1-1".to_string()),
                verdict: Verdict::Reject,
                reviewer: Some("sam".to_string()),
            })
            .await
            .unwrap();
        match outcome {
            DecisionOutcome::Rejected(ids) => assert_eq!(ids.len(), 2),
            other => panic!("expected Rejected, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_decision_before_batch_complete_is_deferred() {
        let h = make_harness(ApprovalConfig::default());
        let pr = open_request(&h).await;
        {
            let mut store = h.store.lock().await;
            // first member has its artifact
            let mut ready = make_fix("b1-1", "ACC-001", FixType::CodeFix, 0.8);
            ready.ticket_reference = Some("ticket-a".to_string());
            store.insert(ready).unwrap();
            store
                .modify("b1-1", |f| f.transition(FixStatus::Routed, Actor::System, None))
                .unwrap();
            store
                .modify("b1-1", |f| f.attach_change_request(pr.clone()))
                .unwrap();
            // second member is still routed; it will share the reference
            let mut late = make_fix("b1-2", "ACC-002", FixType::CodeFix, 0.8);
            late.ticket_reference = Some("ticket-b".to_string());
            store.insert(late).unwrap();
            store
                .modify("b1-2", |f| f.transition(FixStatus::Routed, Actor::System, None))
                .unwrap();
            // simulate the shared reference being known before readiness
            store
                .modify("b1-2", |f| {
                    f.pr_reference = Some(pr.clone());
                    Ok(())
                })
                .unwrap();
        }

        let outcome = h
            .queue
            .decide(DecisionEvent {
                key: DecisionKey::Artifact(pr.clone()),
                verdict: Verdict::Approve,
                reviewer: Some("jamie".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(outcome, DecisionOutcome::Deferred);
        {
            let store = h.store.lock().await;
            assert_eq!(store.get("b1-1").unwrap().status, FixStatus::AwaitingApproval);
            assert_eq!(store.deferred().len(), 1);
        }

        // the last member reaching awaiting_approval replays the decision
        {
            let mut store = h.store.lock().await;
            store
                .modify("b1-2", |f| {
                    f.transition(
                        FixStatus::AwaitingApproval,
                        Actor::System,
                        Some("change request opened".to_string()),
                    )
                })
                .unwrap();
        }
        h.queue.admit("b1-2").await.unwrap();

        let store = h.store.lock().await;
        assert_eq!(store.get("b1-1").unwrap().status, FixStatus::Applied);
        assert_eq!(store.get("b1-2").unwrap().status, FixStatus::Applied);
        assert!(store.deferred().is_empty());
    }

    #[tokio::test]
    async fn test_auto_approve_above_threshold() {
        let h = make_harness(ApprovalConfig {
            auto_approve_threshold: Some(0.85),
            ..Default::default()
        });
        let revision = insert_awaiting_content_fix(&h, "b1-1", "ACC-001").await;

        h.queue.admit("b1-1").await.unwrap();

        assert!(h.cms.is_published(&revision));
        let store = h.store.lock().await;
        let fix = store.get("b1-1").unwrap();
        assert_eq!(fix.status, FixStatus::Applied);
        assert_eq!(fix.reviewed_by.as_deref(), Some("system"));
    }

    #[tokio::test]
    async fn test_below_threshold_waits_for_human() {
        let h = make_harness(ApprovalConfig {
            auto_approve_threshold: Some(0.95),
            ..Default::default()
        });
        insert_awaiting_content_fix(&h, "b1-1", "ACC-001").await;
        h.queue.admit("b1-1").await.unwrap();
        let store = h.store.lock().await;
        assert_eq!(store.get("b1-1").unwrap().status, FixStatus::AwaitingApproval);
    }

    #[tokio::test]
    async fn test_commit_failure_lands_at_failed_with_reason() {
        let h = make_harness(ApprovalConfig::default());
        insert_awaiting_code_fixes(&h, &[("b1-1", "ACC-001")]).await;
        h.vcs.fail_merges_with_conflict();

        let outcome = h
            .queue
            .decide(DecisionEvent {
                key: DecisionKey::Fix("b1-1".to_string()),
                verdict: Verdict::Approve,
                reviewer: Some("jamie".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(
            outcome,
            DecisionOutcome::CommitFailed(vec!["b1-1".to_string()])
        );
        let store = h.store.lock().await;
        let fix = store.get("b1-1").unwrap();
        assert_eq!(fix.status, FixStatus::Failed);
        assert!(fix
            .failure_reason
            .as_deref()
            .unwrap()
            .contains("MergeConflict"));
        let comments = h.tracker.comments_for("ticket-b1-1");
        assert_eq!(comments.len(), 1);
        assert!(comments[0].contains("MergeConflict"));
    }

    #[tokio::test]
    async fn test_notifications_do_not_block_decisions() {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(Mutex::new(
            FixStore::open(&tmp.path().join("fixes.json")).unwrap(),
        ));
        let cms = Arc::new(InMemoryCms::default());
        let tracker = Arc::new(RecordingTracker::default());
        let queue = ApprovalQueue::new(
            store.clone(),
            Some(Arc::new(ContentFixAdapter::new(cms.clone()))),
            None,
            Some(tracker as Arc<dyn TicketTracker>),
            Arc::new(RecordingNotifier::failing()),
            ApprovalConfig::default(),
        );
        let revision = {
            use crate::adapters::traits::{CmsClient, RevisionRequest};
            cms.create_draft_revision(&RevisionRequest {
                entity_id: "node-1".to_string(),
                field_name: "alt".to_string(),
                original: None,
                proposed: "alt".to_string(),
                log_message: String::new(),
            })
            .await
            .unwrap()
        };
        {
            let mut locked = store.lock().await;
            let mut fix = make_fix("b1-1", "ACC-001", FixType::ContentFix, 0.9);
            fix.proposed_value = Some("alt".to_string());
            locked.insert(fix).unwrap();
            locked
                .modify("b1-1", |f| f.transition(FixStatus::Routed, Actor::System, None))
                .unwrap();
            locked.modify("b1-1", |f| f.attach_revision(revision)).unwrap();
        }

        let outcome = queue
            .decide(DecisionEvent {
                key: DecisionKey::Fix("b1-1".to_string()),
                verdict: Verdict::Approve,
                reviewer: Some("jamie".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(outcome, DecisionOutcome::Applied(vec!["b1-1".to_string()]));
    }
}
