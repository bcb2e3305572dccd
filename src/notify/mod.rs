use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::core::fix::ProposedFix;
use crate::error::FixError;

/// Fire-and-forget pipeline events for the chat/notification endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "event")]
pub enum NotifyEvent {
    FixProposed {
        fix_id: String,
        issue_title: String,
        fix_type: String,
    },
    FixApproved {
        fix_id: String,
        reviewer: String,
    },
    FixRejected {
        fix_id: String,
        reviewer: String,
    },
}

impl NotifyEvent {
    pub fn proposed(fix: &ProposedFix) -> Self {
        NotifyEvent::FixProposed {
            fix_id: fix.id.clone(),
            issue_title: fix.issue_title.clone(),
            fix_type: fix.fix_type.to_string(),
        }
    }

    pub fn approved(fix: &ProposedFix, reviewer: &str) -> Self {
        NotifyEvent::FixApproved {
            fix_id: fix.id.clone(),
            reviewer: reviewer.to_string(),
        }
    }

    pub fn rejected(fix: &ProposedFix, reviewer: &str) -> Self {
        NotifyEvent::FixRejected {
            fix_id: fix.id.clone(),
            reviewer: reviewer.to_string(),
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, event: &NotifyEvent) -> Result<(), FixError>;
}

/// Deliver an event, logging failures. Delivery problems never affect fix
/// state.
pub async fn dispatch(notifier: &dyn Notifier, event: NotifyEvent) {
    match notifier.send(&event).await {
        Ok(()) => debug!(?event, "notification delivered"),
        Err(e) => warn!(?event, error = %e, "notification delivery failed"),
    }
}

/// Posts events as JSON to a configured webhook. Without a URL it only logs,
/// which keeps local runs quiet but observable.
pub struct WebhookNotifier {
    url: Option<String>,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(url: Option<String>) -> Self {
        Self {
            url,
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, event: &NotifyEvent) -> Result<(), FixError> {
        let Some(url) = &self.url else {
            debug!(?event, "webhook not configured, skipping notification");
            return Ok(());
        };
        let response = self
            .client
            .post(url)
            .json(event)
            .send()
            .await
            .map_err(|e| FixError::Notification(e.to_string()))?;
        if !response.status().is_success() {
            return Err(FixError::Notification(format!(
                "webhook returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}
