//! Notification inbox and admin broadcast client.
//!
//! Covers the notification endpoints that are not part of token
//! registration: sending an admin message, paging through the history,
//! marking an entry as read and deleting it.

use chrono::{DateTime, Utc};
use courtside_common::models::{optional_id, required_id};
use courtside_common::{create_client, endpoint, ApiResponse, AuthSession};
use courtside_config::ApiConfig;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::api::{authorized, ensure_session, require_success, send_json};
use crate::error::PushError;

pub const SEND_ADMIN_PATH: &str = "/api/notification/send-admin-notification";
pub const HISTORY_PATH: &str = "/api/notification/history";
pub const MARK_READ_PATH: &str = "/api/notification/mark-read";
pub const NOTIFICATION_PATH: &str = "/api/notification";

/// Largest page the history endpoint is asked for.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Who receives an admin notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecipientScope {
    All,
    /// Participants of `event_id`.
    EventParticipants,
    /// Members of `group_id`.
    GroupMembers,
}

/// Admin broadcast request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminNotification {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    pub recipients: RecipientScope,
}

impl AdminNotification {
    pub fn to_all(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            event_id: None,
            group_id: None,
            recipients: RecipientScope::All,
        }
    }

    pub fn to_event(message: impl Into<String>, event_id: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            event_id: Some(event_id.into()),
            group_id: None,
            recipients: RecipientScope::EventParticipants,
        }
    }

    pub fn to_group(message: impl Into<String>, group_id: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            event_id: None,
            group_id: Some(group_id.into()),
            recipients: RecipientScope::GroupMembers,
        }
    }

    /// Checks the message is non-empty and the scope carries its target id.
    pub fn validate(&self) -> Result<(), PushError> {
        if self.message.trim().is_empty() {
            return Err(PushError::Validation(
                "notification message must not be empty".to_string(),
            ));
        }
        let blank = |id: &Option<String>| id.as_deref().map_or(true, |id| id.trim().is_empty());
        match self.recipients {
            RecipientScope::EventParticipants if blank(&self.event_id) => Err(
                PushError::Validation("event participants scope requires an event id".to_string()),
            ),
            RecipientScope::GroupMembers if blank(&self.group_id) => Err(PushError::Validation(
                "group members scope requires a group id".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

/// Backend acknowledgement of an admin broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReceipt {
    pub sent_count: u32,
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    sent_count: Option<u32>,
    #[serde(default)]
    message: Option<String>,
}

/// One entry of the notification history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRecord {
    #[serde(deserialize_with = "required_id")]
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(default, deserialize_with = "optional_id")]
    pub event_id: Option<String>,
    #[serde(default, deserialize_with = "optional_id")]
    pub group_id: Option<String>,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct HistoryResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    notifications: Vec<NotificationRecord>,
}

/// HTTP client for the inbox and admin endpoints.
#[derive(Debug, Clone)]
pub struct NotificationApi {
    client: Client,
    base_url: String,
}

impl NotificationApi {
    pub fn new(config: &ApiConfig) -> Result<Self, PushError> {
        config
            .validate()
            .map_err(|issue| PushError::Config(issue.to_string()))?;
        let client = create_client(config.timeout_secs)?;
        Ok(Self::with_client(client, &config.base_url))
    }

    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Sends an admin notification.
    ///
    /// Failures carry the backend's message so it can be shown to the admin
    /// who initiated the send.
    pub async fn send_admin_notification(
        &self,
        notification: &AdminNotification,
        session: &AuthSession,
    ) -> Result<SendReceipt, PushError> {
        notification.validate()?;
        ensure_session(session)?;

        let url = endpoint(&self.base_url, SEND_ADMIN_PATH);
        debug!(
            "Sending admin notification to {:?} via {}",
            notification.recipients, url
        );

        let request = authorized(self.client.post(&url), session).json(notification);
        let response: SendResponse = send_json(request).await.inspect_err(|err| {
            warn!("Admin notification send failed: {}", err);
        })?;
        require_success(
            response.success,
            response.message.as_deref(),
            "admin notification",
        )?;

        let receipt = SendReceipt {
            sent_count: response.sent_count.unwrap_or(0),
            message: response.message,
        };
        info!("Admin notification delivered to {} recipients", receipt.sent_count);
        Ok(receipt)
    }

    /// Fetches one page of the signed-in user's notification history.
    ///
    /// Pages start at 1; the size is clamped to `1..=MAX_PAGE_SIZE`.
    pub async fn history(
        &self,
        page_number: u32,
        page_size: u32,
        session: &AuthSession,
    ) -> Result<Vec<NotificationRecord>, PushError> {
        ensure_session(session)?;

        let page_number = page_number.max(1);
        let page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        let url = endpoint(&self.base_url, HISTORY_PATH);

        let request = authorized(self.client.get(&url), session).query(&[
            ("pageNumber", page_number),
            ("pageSize", page_size),
        ]);
        let response: HistoryResponse = send_json(request).await?;
        require_success(
            response.success,
            response.message.as_deref(),
            "notification history",
        )?;

        debug!(
            "Fetched {} notifications (page {}, size {})",
            response.notifications.len(),
            page_number,
            page_size
        );
        Ok(response.notifications)
    }

    pub async fn mark_read(
        &self,
        notification_id: &str,
        session: &AuthSession,
    ) -> Result<(), PushError> {
        let notification_id = require_id(notification_id)?;
        ensure_session(session)?;

        let url = endpoint(
            &self.base_url,
            &format!("{}/{}", MARK_READ_PATH, notification_id),
        );
        let response: ApiResponse = send_json(authorized(self.client.post(&url), session)).await?;
        require_success(response.success, response.message.as_deref(), "mark as read")
    }

    pub async fn delete(
        &self,
        notification_id: &str,
        session: &AuthSession,
    ) -> Result<(), PushError> {
        let notification_id = require_id(notification_id)?;
        ensure_session(session)?;

        let url = endpoint(
            &self.base_url,
            &format!("{}/{}", NOTIFICATION_PATH, notification_id),
        );
        let response: ApiResponse = send_json(authorized(self.client.delete(&url), session)).await?;
        require_success(response.success, response.message.as_deref(), "delete notification")?;
        info!("Deleted notification {}", notification_id);
        Ok(())
    }
}

// Ids end up in the URL path.
fn require_id(id: &str) -> Result<&str, PushError> {
    let id = id.trim();
    if id.is_empty() || id.contains(['/', '?', '#']) {
        return Err(PushError::Validation(format!(
            "invalid notification id {:?}",
            id
        )));
    }
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_admin_notification_validation() {
        assert!(AdminNotification::to_all("Courts closed tonight").validate().is_ok());
        assert!(AdminNotification::to_event("Moved to 7pm", "12").validate().is_ok());

        assert!(matches!(
            AdminNotification::to_all("   ").validate(),
            Err(PushError::Validation(_))
        ));

        let mut missing_group = AdminNotification::to_group("Welcome", "g1");
        missing_group.group_id = None;
        assert!(matches!(missing_group.validate(), Err(PushError::Validation(_))));

        let mut blank_event = AdminNotification::to_event("Moved", "e1");
        blank_event.event_id = Some(" ".into());
        assert!(matches!(blank_event.validate(), Err(PushError::Validation(_))));
    }

    #[test]
    fn test_admin_notification_wire_shape() {
        let body = serde_json::to_value(AdminNotification::to_group("Practice", "7")).unwrap();
        assert_eq!(
            body,
            json!({ "message": "Practice", "groupId": "7", "recipients": "group_members" })
        );
    }

    #[test]
    fn test_history_record_accepts_numeric_ids() {
        let record: NotificationRecord = serde_json::from_value(json!({
            "id": 91,
            "type": "event_reminder",
            "message": "Game starts in 1 hour",
            "eventId": 12,
            "isRead": false,
            "createdAt": "2026-05-02T17:00:00Z"
        }))
        .unwrap();

        assert_eq!(record.id, "91");
        assert_eq!(record.kind, "event_reminder");
        assert_eq!(record.event_id.as_deref(), Some("12"));
        assert!(record.group_id.is_none());
        assert!(record.created_at.is_some());
    }

    #[test]
    fn test_require_id() {
        assert_eq!(require_id(" 42 ").unwrap(), "42");
        assert!(require_id("").is_err());
        assert!(require_id("1/../admin").is_err());
    }
}
