//! Maps notification payloads to in-app destinations.
//!
//! Only computes the destination; performing the navigation is up to the UI.

use std::fmt;
use std::str::FromStr;

use courtside_common::NotificationPayload;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Known values of the payload `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    AdminMessage,
    EventCreated,
    EventUpdated,
    EventReminder,
    GroupCreated,
    JoinRequest,
    JoinRequestResponse,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::AdminMessage => "admin_message",
            NotificationKind::EventCreated => "event_created",
            NotificationKind::EventUpdated => "event_updated",
            NotificationKind::EventReminder => "event_reminder",
            NotificationKind::GroupCreated => "group_created",
            NotificationKind::JoinRequest => "join_request",
            NotificationKind::JoinRequestResponse => "join_request_response",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin_message" => Ok(NotificationKind::AdminMessage),
            "event_created" => Ok(NotificationKind::EventCreated),
            "event_updated" => Ok(NotificationKind::EventUpdated),
            "event_reminder" => Ok(NotificationKind::EventReminder),
            "group_created" => Ok(NotificationKind::GroupCreated),
            "join_request" => Ok(NotificationKind::JoinRequest),
            "join_request_response" => Ok(NotificationKind::JoinRequestResponse),
            other => Err(format!("unknown notification type {:?}", other)),
        }
    }
}

/// Where the UI should go after a tap.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "screen", rename_all = "snake_case")]
pub enum NavigationIntent {
    /// Stay where the user is.
    None,
    EventDetail { event_id: String },
    GroupDetail { group_id: String },
}

impl NavigationIntent {
    pub fn is_none(&self) -> bool {
        matches!(self, NavigationIntent::None)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TapRouter;

impl TapRouter {
    pub fn new() -> Self {
        Self
    }

    /// Never fails: unknown types and missing ids yield [`NavigationIntent::None`].
    pub fn route(&self, payload: &NotificationPayload) -> NavigationIntent {
        let kind = match payload.kind.parse::<NotificationKind>() {
            Ok(kind) => kind,
            Err(err) => {
                warn!("Ignoring notification tap: {}", err);
                return NavigationIntent::None;
            }
        };

        let event = || {
            payload
                .event_id
                .clone()
                .map(|event_id| NavigationIntent::EventDetail { event_id })
        };
        let group = || {
            payload
                .group_id
                .clone()
                .map(|group_id| NavigationIntent::GroupDetail { group_id })
        };

        let intent = match kind {
            NotificationKind::EventCreated
            | NotificationKind::EventUpdated
            | NotificationKind::EventReminder => event(),
            NotificationKind::GroupCreated => group(),
            // Admin messages may point at either; the event is more specific.
            NotificationKind::AdminMessage => event().or_else(group),
            NotificationKind::JoinRequest | NotificationKind::JoinRequestResponse => {
                group().or_else(event)
            }
        };

        match intent {
            Some(intent) => {
                debug!("Routing {} tap to {:?}", kind, intent);
                intent
            }
            None => {
                debug!("{} notification carries no destination id", kind);
                NavigationIntent::None
            }
        }
    }
}
