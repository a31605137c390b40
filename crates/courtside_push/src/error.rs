//! Error channel of the push client.
//!
//! Every operation below the orchestrator returns one of these instead of
//! panicking; [`PushError::kind`] groups them the way callers make policy
//! decisions (retry later, re-offer the prompt, fix the setup).

use courtside_common::CourtsideError;
use thiserror::Error;

/// Errors that can occur while managing push registration
#[derive(Error, Debug)]
pub enum PushError {
    /// Missing or invalid configuration (project id, base URL)
    #[error("Missing configuration: {0}")]
    Config(String),

    /// The user declined the notification permission prompt
    #[error("Notification permission denied")]
    PermissionDenied,

    /// The device cannot receive push notifications
    #[error("Push notifications are not supported on this device")]
    Unsupported,

    /// The platform could not issue a token
    #[error("Push token unavailable: {0}")]
    TokenUnavailable(String),

    /// The token does not match the platform envelope format
    #[error("Malformed push token: {0}")]
    MalformedToken(String),

    /// No usable bearer session
    #[error("Authentication required: {0}")]
    Unauthenticated(String),

    /// Transport or decode failure talking to the backend
    #[error("HTTP request error: {0}")]
    Network(#[from] reqwest::Error),

    /// Non-success HTTP status from the backend
    #[error("Backend returned {status}: {message}")]
    Http { status: u16, message: String },

    /// The backend answered without `success: true`
    #[error("Backend rejected the request: {0}")]
    Rejected(String),

    /// Request arguments failed local validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// The persistent key-value store failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// The OS notification platform failed
    #[error("Platform error: {0}")]
    Platform(String),

    /// The operation needs an active push session
    #[error("Push notifications are not active")]
    NotActive,

    /// `cleanup` ran while the operation was in flight; its result was dropped
    #[error("Push session ended before the operation completed")]
    SessionEnded,
}

/// Coarse error classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Developer setup problem; fatal to `initialize`, logged only.
    Configuration,
    /// Denied or unsupported; recorded, may be re-offered later.
    Permission,
    /// Network, backend or storage hiccup; the next trigger retries.
    Transient,
    /// Rejected locally before any network call.
    MalformedToken,
    /// Missing session or inactive service.
    Precondition,
    /// Bad caller input.
    Validation,
}

impl PushError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PushError::Config(_) => ErrorKind::Configuration,
            PushError::PermissionDenied | PushError::Unsupported => ErrorKind::Permission,
            PushError::TokenUnavailable(_)
            | PushError::Network(_)
            | PushError::Http { .. }
            | PushError::Rejected(_)
            | PushError::Storage(_)
            | PushError::Platform(_) => ErrorKind::Transient,
            PushError::MalformedToken(_) => ErrorKind::MalformedToken,
            PushError::Unauthenticated(_) | PushError::NotActive | PushError::SessionEnded => {
                ErrorKind::Precondition
            }
            PushError::Validation(_) => ErrorKind::Validation,
        }
    }

    /// Whether the scheduled triggers will try again on their own.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Transient | ErrorKind::MalformedToken
        )
    }
}

impl From<CourtsideError> for PushError {
    fn from(err: CourtsideError) -> Self {
        match err {
            CourtsideError::ConfigError(message) => PushError::Config(message),
            CourtsideError::AuthError(message) => PushError::Unauthenticated(message),
            CourtsideError::ValidationError(message) => PushError::Validation(message),
            CourtsideError::StorageError(message) => PushError::Storage(message),
            CourtsideError::PlatformError(message) => PushError::Platform(message),
            CourtsideError::HttpError(message) | CourtsideError::ParseError(message) => {
                PushError::Rejected(message)
            }
            CourtsideError::InternalError(message) => PushError::Platform(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taxonomy() {
        assert_eq!(
            PushError::Config("push.project_id".into()).kind(),
            ErrorKind::Configuration
        );
        assert_eq!(PushError::PermissionDenied.kind(), ErrorKind::Permission);
        assert_eq!(
            PushError::Http {
                status: 503,
                message: "maintenance".into()
            }
            .kind(),
            ErrorKind::Transient
        );
        assert_eq!(
            PushError::MalformedToken("abc".into()).kind(),
            ErrorKind::MalformedToken
        );
        assert_eq!(PushError::NotActive.kind(), ErrorKind::Precondition);
    }

    #[test]
    fn test_malformed_token_is_transient_but_permission_is_not() {
        assert!(PushError::MalformedToken("abc".into()).is_transient());
        assert!(PushError::Rejected("nope".into()).is_transient());
        assert!(!PushError::PermissionDenied.is_transient());
        assert!(!PushError::Config("missing".into()).is_transient());
    }

    #[test]
    fn test_collaborator_errors_keep_their_class() {
        let err: PushError = courtside_common::storage_error("disk full").into();
        assert!(matches!(err, PushError::Storage(ref m) if m == "disk full"));

        let err: PushError = courtside_common::auth_error("expired").into();
        assert_eq!(err.kind(), ErrorKind::Precondition);
    }
}
