//! Push token acquisition and envelope validation.
//!
//! The acquirer asks the platform for permission and a token. It never
//! caches: holding on to the last token is the orchestrator's job.

use std::fmt;
use std::sync::Arc;

use courtside_common::{KeyValueStore, PermissionStatus, PushPlatform};
use tracing::{debug, error, info, warn};

use crate::error::PushError;
use crate::storage::keys;

/// Envelope prefixes issued by the push service.
pub const TOKEN_PREFIXES: [&str; 2] = ["ExponentPushToken[", "ExpoPushToken["];

/// Envelope suffix issued by the push service.
pub const TOKEN_SUFFIX: char = ']';

/// A push token that passed envelope validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PushToken(String);

impl PushToken {
    /// Validates `raw` against the `ExponentPushToken[...]` envelope.
    pub fn parse(raw: &str) -> Result<Self, PushError> {
        if is_valid_token(raw) {
            Ok(Self(raw.to_string()))
        } else {
            Err(PushError::MalformedToken(redact(raw)))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for PushToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Non-empty, known prefix, closing bracket, non-empty body, no whitespace.
pub fn is_valid_token(raw: &str) -> bool {
    if raw.is_empty() || raw.chars().any(char::is_whitespace) {
        return false;
    }
    TOKEN_PREFIXES.iter().any(|prefix| {
        raw.strip_prefix(prefix)
            .and_then(|rest| rest.strip_suffix(TOKEN_SUFFIX))
            .is_some_and(|body| !body.is_empty() && !body.contains(['[', ']']))
    })
}

// Tokens are credentials; keep error messages short.
fn redact(raw: &str) -> String {
    let visible: String = raw.chars().take(24).collect();
    if visible.len() < raw.len() {
        format!("{}...", visible)
    } else {
        visible
    }
}

/// Why no token could be obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnavailableReason {
    /// The capability probe reported no push support.
    Unsupported,
    /// No project identifier is configured.
    MissingProjectId,
    /// The platform issuance call failed.
    Issuance(String),
}

impl fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnavailableReason::Unsupported => f.write_str("push is not supported on this device"),
            UnavailableReason::MissingProjectId => f.write_str("project id is not configured"),
            UnavailableReason::Issuance(message) => write!(f, "token issuance failed: {}", message),
        }
    }
}

/// Outcome of a token request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acquisition {
    Token(String),
    PermissionDenied,
    Unavailable(UnavailableReason),
}

impl Acquisition {
    /// Converts the outcome into the error channel.
    pub fn into_result(self) -> Result<String, PushError> {
        match self {
            Acquisition::Token(token) => Ok(token),
            Acquisition::PermissionDenied => Err(PushError::PermissionDenied),
            Acquisition::Unavailable(UnavailableReason::Unsupported) => Err(PushError::Unsupported),
            Acquisition::Unavailable(UnavailableReason::MissingProjectId) => Err(
                PushError::Config("push.project_id is required to request a token".to_string()),
            ),
            Acquisition::Unavailable(reason) => {
                Err(PushError::TokenUnavailable(reason.to_string()))
            }
        }
    }
}

/// Requests permission and obtains a push token from the platform.
pub struct TokenAcquirer {
    platform: Arc<dyn PushPlatform>,
    store: Arc<dyn KeyValueStore>,
    project_id: Option<String>,
}

impl TokenAcquirer {
    pub fn new(
        platform: Arc<dyn PushPlatform>,
        store: Arc<dyn KeyValueStore>,
        project_id: Option<String>,
    ) -> Self {
        let project_id = project_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty());
        Self {
            platform,
            store,
            project_id,
        }
    }

    /// Obtains a token, prompting for permission at most once if needed.
    pub async fn acquire(&self) -> Acquisition {
        self.acquire_with(true).await
    }

    /// Obtains the current token without ever showing a prompt.
    ///
    /// Used by background refreshes: a revoked permission reports
    /// `PermissionDenied` instead of interrupting the user.
    pub async fn refetch(&self) -> Acquisition {
        self.acquire_with(false).await
    }

    /// Whether the user declined the prompt at some point.
    pub async fn previously_denied(&self) -> bool {
        matches!(
            self.store.get(keys::PERMISSION_DENIED).await,
            Ok(Some(ref marker)) if marker == "true"
        )
    }

    /// Forgets a recorded denial so the app can offer the prompt again.
    pub async fn clear_denial(&self) -> Result<(), PushError> {
        self.store.remove(keys::PERMISSION_DENIED).await?;
        Ok(())
    }

    async fn acquire_with(&self, prompt: bool) -> Acquisition {
        if !self.platform.is_push_supported() {
            warn!("Push notifications require a physical device with push support");
            return Acquisition::Unavailable(UnavailableReason::Unsupported);
        }

        let mut status = match self.platform.permission_status().await {
            Ok(status) => status,
            Err(err) => {
                warn!("Could not read notification permission: {}", err);
                PermissionStatus::Undetermined
            }
        };

        if status != PermissionStatus::Granted && prompt {
            debug!("Requesting notification permission");
            status = match self.platform.request_permission().await {
                Ok(status) => status,
                Err(err) => {
                    warn!("Notification permission request failed: {}", err);
                    PermissionStatus::Undetermined
                }
            };
        }

        if status != PermissionStatus::Granted {
            info!("Notification permission not granted ({:?})", status);
            // Undetermined or unreadable is not a denial.
            if status == PermissionStatus::Denied {
                if let Err(err) = self.store.set(keys::PERMISSION_DENIED, "true").await {
                    warn!("Failed to record permission denial: {}", err);
                }
            }
            return Acquisition::PermissionDenied;
        }

        if self.previously_denied().await {
            if let Err(err) = self.store.remove(keys::PERMISSION_DENIED).await {
                warn!("Failed to clear permission denial marker: {}", err);
            }
        }

        let Some(project_id) = self.project_id.as_deref() else {
            error!("Push project id is not configured; cannot request a push token");
            return Acquisition::Unavailable(UnavailableReason::MissingProjectId);
        };

        match self.platform.issue_token(project_id).await {
            Ok(token) => {
                debug!("Platform issued push token {}", redact(&token));
                Acquisition::Token(token)
            }
            Err(err) => {
                warn!("Platform failed to issue a push token: {}", err);
                Acquisition::Unavailable(UnavailableReason::Issuance(err.to_string()))
            }
        }
    }
}
