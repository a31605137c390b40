// --- File: crates/courtside_common/src/models.rs ---

// Shared data structures: the bearer session, platform enums, the
// notification payload delivered by the platform, and the generic
// `{success, message}` envelope returned by the backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Bearer credential for backend calls.
///
/// Owned by the authentication layer; the push client only reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl AuthSession {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            expires_at: None,
        }
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// A session is usable when it carries a token and has not expired at `now`.
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        if self.access_token.trim().is_empty() {
            return false;
        }
        match self.expires_at {
            Some(expires_at) => expires_at > now,
            None => true,
        }
    }
}

/// Operating system of the device, as sent to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DevicePlatform {
    Ios,
    Android,
}

impl DevicePlatform {
    pub fn as_str(&self) -> &'static str {
        match self {
            DevicePlatform::Ios => "ios",
            DevicePlatform::Android => "android",
        }
    }
}

impl std::fmt::Display for DevicePlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Notification permission as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied,
    /// The user has not been asked yet.
    Undetermined,
}

/// Application lifecycle state as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppStatus {
    Active,
    Background,
    Inactive,
}

/// Data attached to a push notification.
///
/// `type` selects the in-app destination; ids may arrive as strings or numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, deserialize_with = "optional_id")]
    pub event_id: Option<String>,
    #[serde(default, deserialize_with = "optional_id")]
    pub group_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NotificationPayload {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            event_id: None,
            group_id: None,
            extra: Map::new(),
        }
    }

    pub fn with_event(mut self, event_id: impl Into<String>) -> Self {
        self.event_id = Some(event_id.into());
        self
    }

    pub fn with_group(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = Some(group_id.into());
        self
    }
}

/// Listener callbacks from the platform notification center.
#[derive(Debug, Clone, PartialEq)]
pub enum NotificationEvent {
    /// Delivered while the app was in the foreground.
    Received(NotificationPayload),
    /// The user tapped or otherwise acted on a notification.
    Responded(NotificationPayload),
}

/// Generic backend response envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// Deserializes an id sent either as a string or as a number.
pub fn required_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    optional_id(deserializer)?.ok_or_else(|| serde::de::Error::custom("missing id"))
}

/// Like [`required_id`], but null and empty strings become `None`.
pub fn optional_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(id)) if id.is_empty() => Ok(None),
        Some(Value::String(id)) => Ok(Some(id)),
        Some(Value::Number(id)) => Ok(Some(id.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected a string or numeric id, got {}",
            other
        ))),
    }
}
