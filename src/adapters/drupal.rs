use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

use crate::adapters::traits::{CmsClient, RevisionRequest};
use crate::error::FixError;

/// Drupal JSON:API client for the content-fix channel.
///
/// All writes go through moderated draft revisions in the configured review
/// state; the live revision is only replaced by the publish commit action
/// after an approval decision.
pub struct DrupalCms {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    review_state: String,
}

impl DrupalCms {
    pub fn new(base_url: String, token: Option<String>, review_state: String) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            review_state,
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
            .header("Accept", "application/vnd.api+json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request
                .header("Content-Type", "application/vnd.api+json")
                .json(&body);
        }
        let response = request
            .send()
            .await
            .map_err(|e| FixError::CmsAccess(e.to_string()))?;

        let status = response.status();
        let payload: Value = response.json().await.unwrap_or(Value::Null);
        if status.is_success() {
            return Ok(payload);
        }
        match status.as_u16() {
            401 | 403 => Err(FixError::CmsAccess(format!("unauthorized ({})", status))),
            404 => Err(FixError::TargetNotFound(path.to_string())),
            409 | 412 => Err(FixError::Conflict(path.to_string())),
            _ => Err(FixError::CmsAccess(format!(
                "{} returned {}",
                path, status
            ))),
        }
    }
}

/// Map the pipeline's target types onto JSON:API resource paths. The site's
/// bundles are configured per install; the pilot site used these.
fn resource_for(target_type: &str) -> &str {
    match target_type {
        "cms-media" => "media/image",
        _ => "node/page",
    }
}

/// Drafts keep the replaced text in the revision log so editors can see the
/// change without diffing revisions.
fn revision_log(request: &RevisionRequest) -> String {
    match &request.original {
        Some(original) => format!("{} (was: \"{}\")", request.log_message, original),
        None => request.log_message.clone(),
    }
}

/// Entity ids are fully qualified `resource/uuid`; revision references add
/// the revision id: `resource/uuid@vid`.
fn split_revision(reference: &str) -> Result<(&str, &str), FixError> {
    reference
        .rsplit_once('@')
        .ok_or_else(|| FixError::UnknownArtifact(reference.to_string()))
}

#[async_trait]
impl CmsClient for DrupalCms {
    async fn fetch_entity(&self, target_type: &str, id: &str) -> Result<String, FixError> {
        let resource = resource_for(target_type);
        self.request(
            reqwest::Method::GET,
            &format!("/jsonapi/{}/{}", resource, id),
            None,
        )
        .await?;
        Ok(format!("{}/{}", resource, id))
    }

    async fn search_entities(
        &self,
        target_type: &str,
        text: &str,
    ) -> Result<Vec<String>, FixError> {
        let resource = resource_for(target_type);
        let payload = self
            .request(
                reqwest::Method::GET,
                &format!(
                    "/jsonapi/{}?filter[body.value][operator]=CONTAINS&filter[body.value][value]={}",
                    resource,
                    urlencode(text)
                ),
                None,
            )
            .await?;
        let ids = payload["data"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item["id"].as_str())
                    .map(|id| format!("{}/{}", resource, id))
                    .collect()
            })
            .unwrap_or_default();
        Ok(ids)
    }

    async fn create_draft_revision(&self, request: &RevisionRequest) -> Result<String, FixError> {
        let (resource, uuid) = request
            .entity_id
            .rsplit_once('/')
            .ok_or_else(|| FixError::TargetNotFound(request.entity_id.clone()))?;
        let resource_type = resource.replace('/', "--");
        let payload = self
            .request(
                reqwest::Method::PATCH,
                &format!("/jsonapi/{}/{}", resource, uuid),
                Some(json!({
                    "data": {
                        "type": resource_type,
                        "id": uuid,
                        "attributes": {
                            request.field_name.clone(): { "value": request.proposed },
                            "moderation_state": self.review_state,
                            "revision_log": revision_log(request),
                        }
                    }
                })),
            )
            .await?;
        let vid = payload["data"]["attributes"]["drupal_internal__vid"]
            .as_u64()
            .ok_or_else(|| FixError::CmsAccess("missing revision id in response".to_string()))?;
        Ok(format!("{}@{}", request.entity_id, vid))
    }

    async fn publish_revision(&self, revision: &str) -> Result<(), FixError> {
        let (entity, _vid) = split_revision(revision)?;
        let (resource, uuid) = entity
            .rsplit_once('/')
            .ok_or_else(|| FixError::UnknownArtifact(revision.to_string()))?;
        self.request(
            reqwest::Method::PATCH,
            &format!("/jsonapi/{}/{}", resource, uuid),
            Some(json!({
                "data": {
                    "type": resource.replace('/', "--"),
                    "id": uuid,
                    "attributes": {
                        "moderation_state": "published",
                        "revision_log": "sitefix: approved revision published",
                    }
                }
            })),
        )
        .await?;
        Ok(())
    }

    async fn discard_revision(&self, revision: &str) -> Result<(), FixError> {
        // Drupal has no revision delete; discarding archives the draft so
        // the editorial queue stays clean.
        let (entity, _vid) = split_revision(revision)?;
        let (resource, uuid) = entity
            .rsplit_once('/')
            .ok_or_else(|| FixError::UnknownArtifact(revision.to_string()))?;
        self.request(
            reqwest::Method::PATCH,
            &format!("/jsonapi/{}/{}", resource, uuid),
            Some(json!({
                "data": {
                    "type": resource.replace('/', "--"),
                    "id": uuid,
                    "attributes": {
                        "moderation_state": "archived",
                        "revision_log": "sitefix: rejected draft discarded",
                    }
                }
            })),
        )
        .await?;
        Ok(())
    }
}

fn urlencode(text: &str) -> String {
    text.bytes()
        .flat_map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                vec![b as char]
            }
            _ => format!("%{:02X}", b).chars().collect(),
        })
        .collect()
}
