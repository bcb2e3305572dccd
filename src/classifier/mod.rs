pub mod rules;

use crate::core::fix::FixType;
use crate::core::issue::Issue;
use rules::RuleTable;

/// Outcome of classifying one issue.
#[derive(Debug, Clone)]
pub struct Classification {
    pub fix_type: FixType,
    pub confidence: f32,
    /// `category/pattern` of the matched rule; None for the fail-safe
    /// default. Code fixes sharing a signature are batched into one change
    /// request.
    pub signature: Option<String>,
    pub rationale: String,
}

/// Pure, deterministic classification over an immutable rule table.
///
/// Never fails: an issue no rule covers defaults to manual handling at
/// confidence zero rather than being dropped.
pub struct Classifier {
    table: RuleTable,
}

impl Classifier {
    pub fn new(table: RuleTable) -> Self {
        Self { table }
    }

    pub fn classify(&self, issue: &Issue) -> Classification {
        match self.table.best_match(&issue.category, &issue.title) {
            Some(rule) => Classification {
                fix_type: rule.fix_type,
                confidence: rule.confidence,
                signature: Some(format!("{}/{}", rule.category, rule.pattern)),
                rationale: rationale_for(rule.fix_type, &rule.category, &rule.pattern),
            },
            None => Classification {
                fix_type: FixType::ManualOnly,
                confidence: 0.0,
                signature: None,
                rationale: format!(
                    "no classification rule matched category '{}'; routing to manual review",
                    issue.category
                ),
            },
        }
    }
}

fn rationale_for(fix_type: FixType, category: &str, pattern: &str) -> String {
    let approach = match fix_type {
        FixType::ContentFix => "a draft revision will be created in the CMS for editorial review",
        FixType::CodeFix => "a change request will be opened against the site codebase",
        FixType::ManualOnly => "this requires human review and decision-making",
        FixType::NotFixable => {
            "this cannot be fixed automatically (external resource or third party)"
        }
    };
    format!("rule {}/{} matched: {}", category, pattern, approach)
}
