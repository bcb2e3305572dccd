use async_trait::async_trait;

use crate::core::fix::ProposedFix;
use crate::error::FixError;

/// External audit/progress record for a fix, owned by the issue tracker.
#[derive(Debug, Clone)]
pub struct Ticket {
    pub title: String,
    pub body: String,
    pub labels: Vec<String>,
}

#[async_trait]
pub trait TicketTracker: Send + Sync {
    async fn create_ticket(&self, ticket: &Ticket) -> Result<String, FixError>;
    async fn comment(&self, reference: &str, body: &str) -> Result<(), FixError>;
    async fn close(&self, reference: &str) -> Result<(), FixError>;
}

/// Build the tracking ticket for a newly created fix record.
pub fn ticket_for_fix(fix: &ProposedFix, extra_labels: &[String]) -> Ticket {
    let mut body = format!(
        "## Website Quality Issue\n\n\
         **Category:** {}\n\
         **Severity:** {}\n\
         **Page:** {}\n\
         **Fix type:** {}\n\
         **Confidence:** {:.0}%\n\
         **Fix record:** `{}` (scan `{}`)\n\n\
         {}\n",
        fix.category,
        fix.severity,
        fix.page_url,
        fix.fix_type,
        fix.confidence * 100.0,
        fix.id,
        fix.scan_id,
        fix.rationale,
    );
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

    let mut labels = vec!["website-quality".to_string(), fix.category.clone()];
    labels.extend(extra_labels.iter().cloned());
    labels.dedup();

    Ticket {
        title: format!("[{}] {}", fix.category, fix.issue_title),
        body,
        labels,
    }
}

/// Comment posted when an adapter produced a reviewable artifact.
pub fn artifact_comment(fix: &ProposedFix) -> String {
    match (&fix.revision_reference, &fix.pr_reference) {
        (Some(revision), _) => format!(
            "Draft revision `{}` created. A human must review and publish \
             the change before it goes live.",
            revision
        ),
        (_, Some(pr)) => format!(
            "Change request `{}` opened. Review and merge to apply the fix.",
            pr
        ),
        _ => "Fix routed; awaiting artifact.".to_string(),
    }
}

/// Comment posted when an adapter fails, stating what was attempted and why
/// it failed so a human can take over without losing context.
pub fn failure_comment(fix: &ProposedFix, error: &FixError) -> String {
    format!(
        "Automated fix failed ({}).\n\n\
         Attempted: {}\n\
         Error: {}\n\n\
         This record is terminal; re-running the fix will create a fresh \
         record for this issue.",
        error.kind(),
        fix.rationale,
        error
    )
}

pub fn rejection_comment(fix: &ProposedFix, reviewer: &str) -> String {
    let artifact = match (&fix.revision_reference, &fix.pr_reference) {
        (Some(revision), _) => format!("draft revision `{}` was discarded", revision),
        (_, Some(pr)) => format!("change request `{}` was closed without merging", pr),
        _ => "no artifact had been produced".to_string(),
    };
    format!(
        "Fix rejected by {}; {}. The issue remains open for manual handling.",
        reviewer, artifact
    )
}
