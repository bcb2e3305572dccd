use colored::*;

use crate::core::fix::{FixStatus, ProposedFix};
use crate::core::store::BatchCounts;

pub struct StatusFormatter {
    format: String,
}

impl StatusFormatter {
    pub fn new(format: &str) -> Self {
        Self {
            format: format.to_string(),
        }
    }

    pub fn display(&self, fixes: &[&ProposedFix], counts: &BatchCounts) {
        match self.format.as_str() {
            "json" => self.display_json(fixes, counts),
            _ => self.display_table(fixes, counts),
        }
    }

    fn display_json(&self, fixes: &[&ProposedFix], counts: &BatchCounts) {
        let output = serde_json::json!({
            "fixes": fixes,
            "summary": counts,
        });
        println!("{}", serde_json::to_string_pretty(&output).unwrap());
    }

    fn display_table(&self, fixes: &[&ProposedFix], counts: &BatchCounts) {
        println!();
        println!(
            "  {:<14} {:<18} {:<12} {:<6} {}",
            "ID".bold(),
            "STATUS".bold(),
            "TYPE".bold(),
            "CONF".bold(),
            "ISSUE".bold()
        );
        println!("  {}", "─".repeat(72));

        for fix in fixes {
            println!(
                "  {:<14} {:<18} {:<12} {:<6} {}",
                fix.id,
                status_label(fix.status),
                fix.fix_type.to_string(),
                format!("{:.0}%", fix.confidence * 100.0),
                fix.issue_title
            );
            if let Some(artifact) = fix.artifact_reference() {
                println!("  {:<14} artifact: {}", "", artifact.dimmed());
            }
            if let Some(ticket) = &fix.ticket_reference {
                println!("  {:<14} ticket:   {}", "", ticket.dimmed());
            }
            if let Some(reason) = &fix.failure_reason {
                println!("  {:<14} {}", "", reason.red());
            }
        }

        println!();
        println!("  {}", "─".repeat(72));
        println!(
            "  {} fixes: {} applied, {} awaiting/in progress, {} manual, {} rejected, {} failed",
            counts.total,
            counts.applied.to_string().green(),
            counts.in_progress + counts.pending,
            counts.manual,
            counts.rejected,
            counts.failed.to_string().red()
        );
        println!();
    }
}

fn status_label(status: FixStatus) -> ColoredString {
    match status {
        FixStatus::Applied => "applied".green(),
        FixStatus::Failed => "failed".red(),
        FixStatus::Rejected => "rejected".yellow(),
        FixStatus::Manual => "manual".blue(),
        FixStatus::AwaitingApproval => "awaiting_approval".cyan(),
        FixStatus::Approved => "approved".cyan(),
        FixStatus::Routed => "routed".normal(),
        FixStatus::Pending => "pending".dimmed(),
    }
}

/// Aggregate counts over an arbitrary set of fixes, mirroring the per-batch
/// counts the store computes.
pub fn tally(fixes: &[&ProposedFix]) -> BatchCounts {
    let mut counts = BatchCounts::default();
    for fix in fixes {
        counts.total += 1;
        match fix.status {
            FixStatus::Applied => counts.applied += 1,
            FixStatus::Failed => counts.failed += 1,
            FixStatus::Rejected => counts.rejected += 1,
            FixStatus::Manual => counts.manual += 1,
            FixStatus::Pending => counts.pending += 1,
            _ => counts.in_progress += 1,
        }
    }
    counts
}
