use async_trait::async_trait;

use crate::error::FixError;

/// A draft revision to create in the CMS. The revision is always written in
/// a non-published editorial state; publishing is a separate commit action
/// triggered only by an approval decision.
#[derive(Debug, Clone)]
pub struct RevisionRequest {
    pub entity_id: String,
    pub field_name: String,
    pub original: Option<String>,
    pub proposed: String,
    pub log_message: String,
}

#[async_trait]
pub trait CmsClient: Send + Sync {
    /// Direct lookup by id/UUID. `TargetNotFound` when the entity does not
    /// exist.
    async fn fetch_entity(&self, target_type: &str, id: &str) -> Result<String, FixError>;

    /// Full-text search used when the target entity is not pre-resolved.
    /// Returns entity ids; the caller decides how to treat 0 or >1 matches.
    async fn search_entities(&self, target_type: &str, text: &str)
        -> Result<Vec<String>, FixError>;

    /// Create exactly one new draft revision. Never mutates published state.
    async fn create_draft_revision(&self, request: &RevisionRequest) -> Result<String, FixError>;

    /// Commit action: publish a previously created draft revision.
    async fn publish_revision(&self, revision: &str) -> Result<(), FixError>;

    /// Discard a draft revision after rejection.
    async fn discard_revision(&self, revision: &str) -> Result<(), FixError>;
}

/// One file-level change inside a change request. `file_path` is present
/// when the target file is pre-resolved (target_type `repo-file`);
/// otherwise the host records the proposal alongside the branch for a human
/// to finish.
#[derive(Debug, Clone)]
pub struct ChangeSpec {
    pub summary: String,
    pub detail: String,
    pub page_url: String,
    pub file_path: Option<String>,
    pub original: Option<String>,
    pub proposed: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ChangeRequest {
    pub title: String,
    pub body: String,
    pub head: String,
    pub base: String,
}

#[async_trait]
pub trait VcsHost: Send + Sync {
    async fn default_branch(&self) -> Result<String, FixError>;

    async fn create_branch(&self, name: &str, from: &str) -> Result<(), FixError>;

    async fn commit_change(&self, branch: &str, change: &ChangeSpec) -> Result<(), FixError>;

    /// Open a change request and return its external reference.
    async fn open_change_request(&self, request: &ChangeRequest) -> Result<String, FixError>;

    /// Commit action: merge into the base branch.
    async fn merge_change_request(&self, reference: &str) -> Result<(), FixError>;

    /// Close without merging after rejection.
    async fn close_change_request(&self, reference: &str) -> Result<(), FixError>;
}
