use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

use crate::core::fix::FixType;

/// One routing rule: `(category, sub-signature) -> fix type` with a default
/// confidence. `pattern: "*"` matches every issue in the category and loses
/// against any literal sub-signature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSpec {
    pub category: String,
    pub pattern: String,
    pub fix_type: FixType,
    pub confidence: f32,
}

/// Immutable, validated rule table loaded once at startup.
#[derive(Debug, Clone)]
pub struct RuleTable {
    rules: Vec<RuleSpec>,
}

impl RuleTable {
    pub fn new(rules: Vec<RuleSpec>) -> Result<Self> {
        for rule in &rules {
            ensure!(
                (0.0..=1.0).contains(&rule.confidence),
                "rule {}/{} has confidence {} outside 0.0..=1.0",
                rule.category,
                rule.pattern,
                rule.confidence
            );
            ensure!(
                !rule.category.is_empty() && !rule.pattern.is_empty(),
                "rule with empty category or pattern"
            );
        }
        let rules = rules
            .into_iter()
            .map(|r| RuleSpec {
                category: r.category.to_lowercase(),
                pattern: r.pattern.to_lowercase(),
                ..r
            })
            .collect();
        Ok(Self { rules })
    }

    /// Site config rules when present, otherwise the built-in table.
    pub fn from_config(rules: &[RuleSpec]) -> Result<Self> {
        if rules.is_empty() {
            Self::new(default_rules())
        } else {
            Self::new(rules.to_vec())
        }
    }

    /// The best rule for a category/title pair: longest matching
    /// sub-signature wins, declaration order breaks ties. Wildcards have
    /// specificity zero.
    pub fn best_match(&self, category: &str, title: &str) -> Option<&RuleSpec> {
        let category = category.to_lowercase();
        let title = title.to_lowercase();
        let mut best: Option<(usize, &RuleSpec)> = None;
        for rule in &self.rules {
            if rule.category != category {
                continue;
            }
            let specificity = if rule.pattern == "*" {
                0
            } else if title.contains(&rule.pattern) {
                rule.pattern.len()
            } else {
                continue;
            };
            match best {
                Some((len, _)) if len >= specificity => {}
                _ => best = Some((specificity, rule)),
            }
        }
        best.map(|(_, rule)| rule)
    }
}

/// Built-in routing table, mirroring how the savaslabs.com pilot routed its
/// issue catalog.
pub fn default_rules() -> Vec<RuleSpec> {
    fn rule(category: &str, pattern: &str, fix_type: FixType, confidence: f32) -> RuleSpec {
        RuleSpec {
            category: category.to_string(),
            pattern: pattern.to_string(),
            fix_type,
            confidence,
        }
    }
    use FixType::*;

    vec![
        // fixable through CMS draft revisions
        rule("accessibility", "image missing alt text", ContentFix, 0.9),
        rule("accessibility", "missing alt text", ContentFix, 0.9),
        rule("spelling", "*", ContentFix, 0.9),
        rule("grammar", "*", ContentFix, 0.8),
        rule("formatting", "*", ContentFix, 0.6),
        rule("seo", "missing meta description", ContentFix, 0.7),
        rule("seo", "meta description too short", ContentFix, 0.7),
        rule("seo", "meta description too long", ContentFix, 0.7),
        // fixable through a template/config change request
        rule("accessibility", "missing language declaration", CodeFix, 0.95),
        rule("accessibility", "empty link text", CodeFix, 0.85),
        rule("accessibility", "link has no text", CodeFix, 0.85),
        rule("accessibility", "icon button missing accessible name", CodeFix, 0.75),
        rule("accessibility", "missing form label", CodeFix, 0.75),
        rule("accessibility", "*", CodeFix, 0.7),
        rule("seo", "missing canonical", CodeFix, 0.8),
        rule("seo", "multiple h1 tags", CodeFix, 0.7),
        rule("seo", "*", CodeFix, 0.7),
        rule("mobile", "viewport not configured", CodeFix, 0.85),
        rule("mobile", "missing viewport meta tag", CodeFix, 0.85),
        rule("mobile", "*", CodeFix, 0.7),
        // needs a human decision
        rule("compliance", "*", ManualOnly, 0.0),
        rule("security", "*", ManualOnly, 0.0),
        rule("performance", "*", ManualOnly, 0.0),
        // detection-only
        rule("links", "external broken link", NotFixable, 0.0),
        rule("links", "external link returns", NotFixable, 0.0),
        rule("links", "*", ManualOnly, 0.0),
    ]
}
