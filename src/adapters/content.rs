use std::sync::Arc;

use tracing::debug;

use crate::adapters::traits::{CmsClient, RevisionRequest};
use crate::core::fix::ProposedFix;
use crate::error::FixError;

const DEFAULT_TARGET_TYPE: &str = "cms-node";
const DEFAULT_FIELD: &str = "body";

/// Materializes a content fix as a draft revision in the CMS.
pub struct ContentFixAdapter {
    cms: Arc<dyn CmsClient>,
}

impl ContentFixAdapter {
    pub fn new(cms: Arc<dyn CmsClient>) -> Self {
        Self { cms }
    }

    /// Resolve the target entity and create one draft revision. Returns the
    /// revision reference on success; every error maps to a terminal
    /// `failed` for the fix.
    pub async fn propose(&self, fix: &ProposedFix) -> Result<String, FixError> {
        let target_type = fix.target_type.as_deref().unwrap_or(DEFAULT_TARGET_TYPE);
        let entity_id = self.resolve_entity(fix, target_type).await?;
        debug!(fix = %fix.id, entity = %entity_id, "resolved content target");

        let proposed = fix
            .proposed_value
            .clone()
            .ok_or_else(|| FixError::TargetNotFound("no proposed value to apply".to_string()))?;

        let request = RevisionRequest {
            entity_id,
            field_name: fix
                .field_name
                .clone()
                .unwrap_or_else(|| DEFAULT_FIELD.to_string()),
            original: fix.original_value.clone(),
            proposed,
            log_message: format!("sitefix {}: {}", fix.id, fix.issue_title),
        };
        self.cms.create_draft_revision(&request).await
    }

    /// Commit action for an approved content fix.
    pub async fn publish(&self, revision: &str) -> Result<(), FixError> {
        self.cms.publish_revision(revision).await
    }

    /// Discard the draft after rejection, leaving nothing unpublished
    /// lingering in the editorial queue.
    pub async fn discard(&self, revision: &str) -> Result<(), FixError> {
        self.cms.discard_revision(revision).await
    }

    async fn resolve_entity(
        &self,
        fix: &ProposedFix,
        target_type: &str,
    ) -> Result<String, FixError> {
        if let Some(id) = &fix.target_id {
            return self.cms.fetch_entity(target_type, id).await;
        }

        // not pre-resolved: full-text search on the text being replaced
        let query = fix
            .original_value
            .as_deref()
            .unwrap_or(fix.issue_title.as_str());
        let candidates = self.cms.search_entities(target_type, query).await?;
        match candidates.len() {
            0 => Err(FixError::TargetNotFound(format!(
                "no {} matches '{}' ({})",
                target_type, query, fix.page_url
            ))),
            1 => Ok(candidates.into_iter().next().expect("len checked")),
            n => Err(FixError::AmbiguousTarget {
                query: query.to_string(),
                candidates: n,
            }),
        }
    }
}
