use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FixError;

pub const MAX_USER_NOTE_LEN: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixType {
    ContentFix,
    CodeFix,
    ManualOnly,
    NotFixable,
}

impl FixType {
    /// Whether an adapter can attempt this fix automatically.
    pub fn is_fixable(&self) -> bool {
        matches!(self, FixType::ContentFix | FixType::CodeFix)
    }
}

impl std::fmt::Display for FixType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FixType::ContentFix => write!(f, "content_fix"),
            FixType::CodeFix => write!(f, "code_fix"),
            FixType::ManualOnly => write!(f, "manual_only"),
            FixType::NotFixable => write!(f, "not_fixable"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixStatus {
    Pending,
    Routed,
    AwaitingApproval,
    Approved,
    Rejected,
    Applied,
    Failed,
    Manual,
}

impl FixStatus {
    /// Transition table. Rejection is additionally reachable from any
    /// pre-commit state so a human can abandon a fix; once `approved` the
    /// commit action runs to a definite applied/failed outcome.
    pub fn allows(self, next: FixStatus) -> bool {
        use FixStatus::*;
        matches!(
            (self, next),
            (Pending, Routed)
                | (Pending, Manual)
                | (Pending, Rejected)
                | (Routed, AwaitingApproval)
                | (Routed, Failed)
                | (Routed, Rejected)
                | (AwaitingApproval, Approved)
                | (AwaitingApproval, Rejected)
                | (Approved, Applied)
                | (Approved, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            FixStatus::Applied | FixStatus::Failed | FixStatus::Rejected | FixStatus::Manual
        )
    }
}

impl std::fmt::Display for FixStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FixStatus::Pending => "pending",
            FixStatus::Routed => "routed",
            FixStatus::AwaitingApproval => "awaiting_approval",
            FixStatus::Approved => "approved",
            FixStatus::Rejected => "rejected",
            FixStatus::Applied => "applied",
            FixStatus::Failed => "failed",
            FixStatus::Manual => "manual",
        };
        write!(f, "{}", s)
    }
}

/// Who caused a transition, for the audit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "name")]
pub enum Actor {
    System,
    Reviewer(String),
}

impl std::fmt::Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Actor::System => write!(f, "system"),
            Actor::Reviewer(name) => write!(f, "reviewer:{}", name),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from: FixStatus,
    pub to: FixStatus,
    pub at: DateTime<Utc>,
    pub actor: Actor,
    #[serde(default)]
    pub note: Option<String>,
}

/// A tracked unit of remediation work for one detected issue.
///
/// Never deleted: rejected and failed records are retained for audit, and
/// re-attempting a fix creates a new record referencing the same issue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposedFix {
    pub id: String,
    pub issue_id: String,
    pub scan_id: String,
    pub batch_id: String,
    pub fix_type: FixType,
    pub status: FixStatus,
    pub issue_title: String,
    pub page_url: String,
    pub category: String,
    pub severity: String,
    #[serde(default)]
    pub target_type: Option<String>,
    #[serde(default)]
    pub target_id: Option<String>,
    #[serde(default)]
    pub field_name: Option<String>,
    #[serde(default)]
    pub original_value: Option<String>,
    #[serde(default)]
    pub proposed_value: Option<String>,
    /// Set once at creation, never mutated.
    pub confidence: f32,
    pub ai_generated: bool,
    #[serde(default)]
    pub user_note: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub reviewed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reviewed_by: Option<String>,
    #[serde(default)]
    pub revision_reference: Option<String>,
    #[serde(default)]
    pub pr_reference: Option<String>,
    #[serde(default)]
    pub ticket_reference: Option<String>,
    #[serde(default)]
    pub failure_reason: Option<String>,
    /// Why the classifier routed (or refused to route) this issue.
    pub rationale: String,
    pub history: Vec<TransitionRecord>,
}

impl ProposedFix {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: String,
        issue: &crate::core::issue::Issue,
        scan_id: String,
        batch_id: String,
        fix_type: FixType,
        confidence: f32,
        rationale: String,
        user_note: Option<String>,
    ) -> Result<Self, FixError> {
        if let Some(note) = &user_note {
            if note.chars().count() > MAX_USER_NOTE_LEN {
                return Err(FixError::NoteTooLong {
                    max: MAX_USER_NOTE_LEN,
                    len: note.chars().count(),
                });
            }
        }
        let values = crate::core::issue::extract_values(issue);
        Ok(Self {
            id,
            issue_id: issue.id.clone(),
            scan_id,
            batch_id,
            fix_type,
            status: FixStatus::Pending,
            issue_title: issue.title.clone(),
            page_url: issue.url.clone(),
            category: issue.category.clone(),
            severity: issue.severity.to_string(),
            target_type: None,
            target_id: None,
            field_name: None,
            original_value: values.original,
            proposed_value: values.proposed,
            confidence,
            ai_generated: false,
            user_note,
            created_at: Utc::now(),
            reviewed_at: None,
            reviewed_by: None,
            revision_reference: None,
            pr_reference: None,
            ticket_reference: None,
            failure_reason: None,
            rationale,
            history: Vec::new(),
        })
    }

    /// Advance the state machine, recording the transition for audit.
    ///
    /// Sets `reviewed_at`/`reviewed_by` on entry into approved or rejected.
    pub fn transition(
        &mut self,
        next: FixStatus,
        actor: Actor,
        note: Option<String>,
    ) -> Result<(), FixError> {
        if !self.status.allows(next) {
            return Err(FixError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        let now = Utc::now();
        self.history.push(TransitionRecord {
            from: self.status,
            to: next,
            at: now,
            actor: actor.clone(),
            note: note.clone(),
        });
        if matches!(next, FixStatus::Approved | FixStatus::Rejected) {
            self.reviewed_at = Some(now);
            self.reviewed_by = Some(actor.to_string());
        }
        if matches!(next, FixStatus::Failed) {
            if let Some(reason) = note {
                self.failure_reason = Some(reason);
            }
        }
        self.status = next;
        Ok(())
    }

    /// Attach the CMS revision produced by the content adapter and move to
    /// awaiting_approval. Only valid from `routed`, and only for a record
    /// without an existing artifact.
    pub fn attach_revision(&mut self, revision: String) -> Result<(), FixError> {
        if self.status != FixStatus::Routed || self.pr_reference.is_some() {
            return Err(FixError::InvalidTransition {
                from: self.status,
                to: FixStatus::AwaitingApproval,
            });
        }
        self.revision_reference = Some(revision.clone());
        self.transition(
            FixStatus::AwaitingApproval,
            Actor::System,
            Some(format!("revision {} created", revision)),
        )
    }

    /// Attach the change request produced by the code adapter and move to
    /// awaiting_approval. Batch members share the same reference.
    pub fn attach_change_request(&mut self, pr: String) -> Result<(), FixError> {
        if self.status != FixStatus::Routed || self.revision_reference.is_some() {
            return Err(FixError::InvalidTransition {
                from: self.status,
                to: FixStatus::AwaitingApproval,
            });
        }
        self.pr_reference = Some(pr.clone());
        self.transition(
            FixStatus::AwaitingApproval,
            Actor::System,
            Some(format!("change request {} opened", pr)),
        )
    }

    pub fn artifact_reference(&self) -> Option<&str> {
        self.revision_reference
            .as_deref()
            .or(self.pr_reference.as_deref())
    }
}
