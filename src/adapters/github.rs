use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

use crate::adapters::traits::{ChangeRequest, ChangeSpec, VcsHost};
use crate::error::FixError;
use crate::tracker::{Ticket, TicketTracker};

const BASE_URL: &str = "https://api.github.com";

/// GitHub REST client backing both the code-fix channel (branches and pull
/// requests) and the tracking-ticket channel (issues).
///
/// Change request and ticket references use the `owner/repo#number` form so
/// they read well in tickets and resolve back to API calls.
pub struct GitHubHost {
    client: reqwest::Client,
    base_url: String,
    repo: String,
    token: Option<String>,
}

impl GitHubHost {
    pub fn new(repo: String, token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .user_agent("sitefix")
                .build()
                .unwrap_or_default(),
            base_url: BASE_URL.to_string(),
            repo,
            token,
        }
    }

    async fn request(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, FixError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self
            .client
            .request(method, &url)
            .header("Accept", "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request
            .send()
            .await
            .map_err(|e| FixError::RepositoryAccess(e.to_string()))?;

        let status = response.status();
        let payload: Value = response.json().await.unwrap_or(Value::Null);
        if status.is_success() {
            return Ok(payload);
        }
        let detail = payload["message"].as_str().unwrap_or("unknown error");
        match status.as_u16() {
            401 | 403 => Err(FixError::RepositoryAccess(format!(
                "{} ({})",
                detail, status
            ))),
            404 => Err(FixError::TargetNotFound(format!("{} {}", path, detail))),
            405 | 409 => Err(FixError::MergeConflict {
                base: detail.to_string(),
            }),
            _ => Err(FixError::RepositoryAccess(format!(
                "{} returned {}: {}",
                path, status, detail
            ))),
        }
    }

    fn reference(&self, number: u64) -> String {
        format!("{}#{}", self.repo, number)
    }
}

/// Parse `owner/repo#number` back into its number.
fn reference_number(reference: &str) -> Result<u64, FixError> {
    reference
        .rsplit_once('#')
        .and_then(|(_, n)| n.parse().ok())
        .ok_or_else(|| FixError::UnknownArtifact(reference.to_string()))
}

#[async_trait]
impl VcsHost for GitHubHost {
    async fn default_branch(&self) -> Result<String, FixError> {
        let repo = self
            .request(reqwest::Method::GET, &format!("/repos/{}", self.repo), None)
            .await?;
        repo["default_branch"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| FixError::RepositoryAccess("missing default_branch".to_string()))
    }

    async fn create_branch(&self, name: &str, from: &str) -> Result<(), FixError> {
        let head = self
            .request(
                reqwest::Method::GET,
                &format!("/repos/{}/git/ref/heads/{}", self.repo, from),
                None,
            )
            .await?;
        let sha = head["object"]["sha"]
            .as_str()
            .ok_or_else(|| FixError::RepositoryAccess(format!("no sha for branch {}", from)))?;
        let result = self
            .request(
                reqwest::Method::POST,
                &format!("/repos/{}/git/refs", self.repo),
                Some(json!({ "ref": format!("refs/heads/{}", name), "sha": sha })),
            )
            .await;
        match result {
            Ok(_) => Ok(()),
            // branch left over from a previous attempt is fine to reuse
            Err(FixError::MergeConflict { base }) if base.contains("already exists") => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn commit_change(&self, branch: &str, change: &ChangeSpec) -> Result<(), FixError> {
        let (path, content) = match (&change.file_path, &change.proposed) {
            (Some(path), Some(content)) => (path.clone(), content.clone()),
            // target file not pre-resolved: record the proposal on the
            // branch for a human to finish
            _ => (
                format!(".sitefix/proposals/{}.md", slugify(&change.summary)),
                format!(
                    "# {}\n\n{}\n\nPage: {}\n\nOriginal:\n```\n{}\n```\n\nProposed:\n```\n{}\n```\n",
                    change.summary,
                    change.detail,
                    change.page_url,
                    change.original.as_deref().unwrap_or("(not specified)"),
                    change.proposed.as_deref().unwrap_or("(not specified)")
                ),
            ),
        };

        // existing file needs its blob sha for the update call
        let existing = self
            .request(
                reqwest::Method::GET,
                &format!("/repos/{}/contents/{}?ref={}", self.repo, path, branch),
                None,
            )
            .await;
        let sha = match existing {
            Ok(value) => value["sha"].as_str().map(str::to_string),
            Err(FixError::TargetNotFound(_)) => None,
            Err(e) => return Err(e),
        };

        use base64::Engine as _;
        let mut body = json!({
            "message": change.summary,
            "content": base64::engine::general_purpose::STANDARD.encode(content.as_bytes()),
            "branch": branch,
        });
        if let Some(sha) = sha {
            body["sha"] = json!(sha);
        }
        self.request(
            reqwest::Method::PUT,
            &format!("/repos/{}/contents/{}", self.repo, path),
            Some(body),
        )
        .await?;
        Ok(())
    }

    async fn open_change_request(&self, request: &ChangeRequest) -> Result<String, FixError> {
        let pr = self
            .request(
                reqwest::Method::POST,
                &format!("/repos/{}/pulls", self.repo),
                Some(json!({
                    "title": request.title,
                    "body": request.body,
                    "head": request.head,
                    "base": request.base,
                })),
            )
            .await?;
        let number = pr["number"]
            .as_u64()
            .ok_or_else(|| FixError::RepositoryAccess("missing pull number".to_string()))?;
        Ok(self.reference(number))
    }

    async fn merge_change_request(&self, reference: &str) -> Result<(), FixError> {
        let number = reference_number(reference)?;
        self.request(
            reqwest::Method::PUT,
            &format!("/repos/{}/pulls/{}/merge", self.repo, number),
            Some(json!({ "merge_method": "squash" })),
        )
        .await?;
        Ok(())
    }

    async fn close_change_request(&self, reference: &str) -> Result<(), FixError> {
        let number = reference_number(reference)?;
        self.request(
            reqwest::Method::PATCH,
            &format!("/repos/{}/pulls/{}", self.repo, number),
            Some(json!({ "state": "closed" })),
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl TicketTracker for GitHubHost {
    async fn create_ticket(&self, ticket: &Ticket) -> Result<String, FixError> {
        let issue = self
            .request(
                reqwest::Method::POST,
                &format!("/repos/{}/issues", self.repo),
                Some(json!({
                    "title": ticket.title,
                    "body": ticket.body,
                    "labels": ticket.labels,
                })),
            )
            .await
            .map_err(|e| FixError::TrackerAccess(e.to_string()))?;
        let number = issue["number"]
            .as_u64()
            .ok_or_else(|| FixError::TrackerAccess("missing issue number".to_string()))?;
        Ok(self.reference(number))
    }

    async fn comment(&self, reference: &str, body: &str) -> Result<(), FixError> {
        let number = reference_number(reference)?;
        self.request(
            reqwest::Method::POST,
            &format!("/repos/{}/issues/{}/comments", self.repo, number),
            Some(json!({ "body": body })),
        )
        .await
        .map_err(|e| FixError::TrackerAccess(e.to_string()))?;
        Ok(())
    }

    async fn close(&self, reference: &str) -> Result<(), FixError> {
        let number = reference_number(reference)?;
        self.request(
            reqwest::Method::PATCH,
            &format!("/repos/{}/issues/{}", self.repo, number),
            Some(json!({ "state": "closed" })),
        )
        .await
        .map_err(|e| FixError::TrackerAccess(e.to_string()))?;
        Ok(())
    }
}

fn slugify(text: &str) -> String {
    text.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}
