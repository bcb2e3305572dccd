use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Critical => write!(f, "critical"),
            Severity::High => write!(f, "high"),
            Severity::Medium => write!(f, "medium"),
            Severity::Low => write!(f, "low"),
        }
    }
}

/// A quality finding produced by the scan/analyzer subsystem.
///
/// Read-only input: this tool never mutates issues, it only classifies them
/// and tracks remediation separately.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub id: String,
    pub category: String,
    pub severity: Severity,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub recommendation: Option<String>,
    pub url: String,
    /// HTML element or surrounding markup where the issue was found.
    #[serde(default)]
    pub element: Option<String>,
}

/// original/proposed values extracted from an issue's text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedValues {
    pub original: Option<String>,
    pub proposed: Option<String>,
}

/// Pull original/proposed replacement text out of the analyzer's prose.
///
/// Recognized shapes:
/// - title `Spelling error: 'word'` plus recommendation `Change to: fix`
/// - a broken `<a href=...>text</a>` in the element markup, where the
///   proposal is to keep only the link text
pub fn extract_values(issue: &Issue) -> ExtractedValues {
    let mut values = ExtractedValues::default();

    let title_re = Regex::new(r#"(?i)error:\s*['"]([^'"]+)['"]"#).unwrap();
    if let Some(caps) = title_re.captures(&issue.title) {
        values.original = Some(caps[1].to_string());
    }

    if let Some(rec) = &issue.recommendation {
        let rec_re = Regex::new(r"(?i)change to:\s*(.+)").unwrap();
        if let Some(caps) = rec_re.captures(rec) {
            values.proposed = Some(caps[1].trim().to_string());
        }
    }

    if values.original.is_none() {
        if let Some(element) = &issue.element {
            let link_re =
                Regex::new(r#"(?i)(<a\s+href=["'][^"']+["'][^>]*>([^<]+)</a>)"#).unwrap();
            if let Some(caps) = link_re.captures(element) {
                values.original = Some(caps[1].to_string());
                values.proposed = Some(caps[2].to_string());
            }
        }
    }

    values
}
