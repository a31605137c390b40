// --- File: crates/courtside_common/src/services.rs ---
//! Collaborator abstractions.
//!
//! The push client never talks to the OS notification center, the device's
//! key-value storage or the login layer directly. These traits are the seams;
//! the application supplies implementations and tests supply fakes.

use std::future::Future;
use std::pin::Pin;

use tokio::sync::broadcast;

use crate::error::CourtsideError;
use crate::models::{
    AppStatus, AuthSession, DevicePlatform, NotificationEvent, NotificationPayload,
    PermissionStatus,
};

/// Type alias for a boxed future that returns a Result
pub type BoxFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// Persistent string key-value storage (the device's async storage).
pub trait KeyValueStore: Send + Sync {
    /// Returns the stored value, or `None` when the key is absent.
    fn get(&self, key: &str) -> BoxFuture<'_, Option<String>, CourtsideError>;

    fn set(&self, key: &str, value: &str) -> BoxFuture<'_, (), CourtsideError>;

    fn remove(&self, key: &str) -> BoxFuture<'_, (), CourtsideError>;
}

/// The OS notification platform: permission prompt, token issuance and
/// the listener surfaces the push client subscribes to.
pub trait PushPlatform: Send + Sync {
    fn device_platform(&self) -> DevicePlatform;

    /// Semi-stable hardware signal (model or build identifier).
    ///
    /// May fail or be unavailable on some devices.
    fn device_model(&self) -> Result<Option<String>, CourtsideError>;

    /// Capability probe: false on simulators and devices without push support.
    fn is_push_supported(&self) -> bool;

    fn permission_status(&self) -> BoxFuture<'_, PermissionStatus, CourtsideError>;

    /// Shows the user-facing permission prompt and returns the outcome.
    fn request_permission(&self) -> BoxFuture<'_, PermissionStatus, CourtsideError>;

    /// Obtains a push token for the given project identifier.
    fn issue_token(&self, project_id: &str) -> BoxFuture<'_, String, CourtsideError>;

    /// The notification the app was launched from, if any.
    fn last_notification_response(
        &self,
    ) -> BoxFuture<'_, Option<NotificationPayload>, CourtsideError>;

    /// Where the app is right now.
    fn current_app_state(&self) -> AppStatus;

    /// Application foreground/background transitions.
    fn subscribe_app_state(&self) -> broadcast::Receiver<AppStatus>;

    /// Notification received/response listener.
    fn subscribe_notifications(&self) -> broadcast::Receiver<NotificationEvent>;
}

/// Source of the current bearer session.
pub trait SessionProvider: Send + Sync {
    fn current_session(&self) -> Option<AuthSession>;
}
