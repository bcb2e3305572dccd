use std::sync::Arc;

use tracing::debug;

use crate::adapters::traits::{ChangeRequest, ChangeSpec, VcsHost};
use crate::core::fix::ProposedFix;
use crate::error::FixError;

/// Materializes code fixes as a branch plus change request, never a direct
/// commit to the mainline.
pub struct CodeFixAdapter {
    vcs: Arc<dyn VcsHost>,
    base_branch: Option<String>,
    branch_prefix: String,
}

impl CodeFixAdapter {
    pub fn new(vcs: Arc<dyn VcsHost>, base_branch: Option<String>, branch_prefix: String) -> Self {
        Self {
            vcs,
            base_branch,
            branch_prefix,
        }
    }

    /// One fix, one change request.
    pub async fn propose(&self, fix: &ProposedFix) -> Result<String, FixError> {
        let base = self.resolve_base().await?;
        let branch = format!("{}/{}", self.branch_prefix, fix.id);
        self.vcs.create_branch(&branch, &base).await?;
        self.vcs.commit_change(&branch, &change_for(fix)).await?;

        let request = ChangeRequest {
            title: format!("[Fix] {}", fix.issue_title),
            body: request_body(std::slice::from_ref(fix)),
            head: branch,
            base,
        };
        let reference = self.vcs.open_change_request(&request).await?;
        debug!(fix = %fix.id, pr = %reference, "opened change request");
        Ok(reference)
    }

    /// Batch mode: several fixes sharing a root cause land in a single
    /// change request. Each fix keeps its own commit so the per-fix trail
    /// survives review.
    pub async fn propose_batch(
        &self,
        fixes: &[ProposedFix],
        signature: &str,
    ) -> Result<String, FixError> {
        let base = self.resolve_base().await?;
        let batch_id = &fixes[0].batch_id;
        let branch = format!("{}/{}-{}", self.branch_prefix, batch_id, slug(signature));
        self.vcs.create_branch(&branch, &base).await?;
        for fix in fixes {
            self.vcs.commit_change(&branch, &change_for(fix)).await?;
        }

        let request = ChangeRequest {
            title: format!("[Fix] {} ({} occurrences)", fixes[0].issue_title, fixes.len()),
            body: request_body(fixes),
            head: branch,
            base,
        };
        let reference = self.vcs.open_change_request(&request).await?;
        debug!(batch = %batch_id, pr = %reference, count = fixes.len(), "opened batch change request");
        Ok(reference)
    }

    /// Commit action for an approved code fix.
    pub async fn merge(&self, reference: &str) -> Result<(), FixError> {
        self.vcs.merge_change_request(reference).await
    }

    /// Close without merging after rejection.
    pub async fn close(&self, reference: &str) -> Result<(), FixError> {
        self.vcs.close_change_request(reference).await
    }

    async fn resolve_base(&self) -> Result<String, FixError> {
        match &self.base_branch {
            Some(base) => Ok(base.clone()),
            None => self.vcs.default_branch().await,
        }
    }
}

fn change_for(fix: &ProposedFix) -> ChangeSpec {
    let file_path = match fix.target_type.as_deref() {
        Some("repo-file") => fix.target_id.clone(),
        _ => None,
    };
    ChangeSpec {
        summary: format!("fix: {}", fix.issue_title),
        detail: fix.rationale.clone(),
        page_url: fix.page_url.clone(),
        file_path,
        original: fix.original_value.clone(),
        proposed: fix.proposed_value.clone(),
    }
}

fn request_body(fixes: &[ProposedFix]) -> String {
    let mut body = String::from("## Website Quality Fix\n\n");
    for fix in fixes {
        body.push_str(&format!(
            "**Issue:** {} ({}, {})\n**Page:** {}\n",
            fix.issue_title, fix.category, fix.severity, fix.page_url
        ));
        if let Some(ticket) = &fix.ticket_reference {
            body.push_str(&format!("**Tracking:** {}\n", ticket));
        }
        if fix.original_value.is_some() || fix.proposed_value.is_some() {
            body.push_str(&format!(
                "\n### Original\n```\n{}\n```\n\n### Suggested\n```\n{}\n```\n",
                fix.original_value.as_deref().unwrap_or("(not specified)"),
                fix.proposed_value.as_deref().unwrap_or("(not specified)")
            ));
        }
        if let Some(note) = &fix.user_note {
            body.push_str(&format!("\n### Reviewer Note\n{}\n", note));
        }
        body.push('\n');
    }
    body.push_str("---\nProposed by sitefix; do not merge without review.\n");
    body
}

fn slug(signature: &str) -> String {
    signature
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}
