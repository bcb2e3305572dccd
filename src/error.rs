use thiserror::Error;

use crate::core::fix::FixStatus;

/// Failures that terminate an individual fix or are swallowed by policy.
///
/// Adapter errors end the fix at `failed` and are surfaced on the tracking
/// ticket. `DuplicateDecision` is an idempotent no-op. Notification errors
/// are logged and never affect fix state.
#[derive(Debug, Error)]
pub enum FixError {
    #[error("target not found: {0}")]
    TargetNotFound(String),

    #[error("ambiguous target: {candidates} candidates matched {query}")]
    AmbiguousTarget { query: String, candidates: usize },

    #[error("write conflict on {0}: concurrent edit detected")]
    Conflict(String),

    #[error("merge conflict applying changes onto {base}")]
    MergeConflict { base: String },

    #[error("repository access failed: {0}")]
    RepositoryAccess(String),

    #[error("CMS access failed: {0}")]
    CmsAccess(String),

    #[error("tracker access failed: {0}")]
    TrackerAccess(String),

    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: FixStatus, to: FixStatus },

    #[error("duplicate decision for fix {0}")]
    DuplicateDecision(String),

    #[error("unknown fix: {0}")]
    UnknownFix(String),

    #[error("no fix owns artifact reference {0}")]
    UnknownArtifact(String),

    #[error("user note exceeds {max} characters ({len})")]
    NoteTooLong { max: usize, len: usize },

    #[error("notification delivery failed: {0}")]
    Notification(String),
}

impl FixError {
    /// Short kind label persisted on failed fix records and ticket comments.
    pub fn kind(&self) -> &'static str {
        match self {
            FixError::TargetNotFound(_) => "TargetNotFound",
            FixError::AmbiguousTarget { .. } => "AmbiguousTarget",
            FixError::Conflict(_) => "ConflictError",
            FixError::MergeConflict { .. } => "MergeConflict",
            FixError::RepositoryAccess(_) => "RepositoryAccessError",
            FixError::CmsAccess(_) => "CMSAccessError",
            FixError::TrackerAccess(_) => "TrackerAccessError",
            FixError::InvalidTransition { .. } => "InvalidTransition",
            FixError::DuplicateDecision(_) => "DuplicateDecisionEvent",
            FixError::UnknownFix(_) => "UnknownFix",
            FixError::UnknownArtifact(_) => "UnknownArtifact",
            FixError::NoteTooLong { .. } => "NoteTooLong",
            FixError::Notification(_) => "NotificationDeliveryError",
        }
    }
}
