//! Backend token registry client.
//!
//! The backend keeps one row per device. `register` inserts or replaces the
//! row for this device; `update` patches an existing row. The two endpoints
//! are deliberately kept apart and never substituted for each other.

use courtside_common::{
    create_client, endpoint, ApiResponse, AuthSession, BoxFuture, DevicePlatform,
};
use courtside_config::ApiConfig;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::api::{authorized, ensure_session, require_success, send_json};
use crate::error::PushError;
use crate::identity::DeviceIdentity;
use crate::token::PushToken;

pub const REGISTER_PATH: &str = "/api/notification/register-token";
pub const UPDATE_PATH: &str = "/api/notification/update-push-token";

/// Body of both registry calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationPayload {
    pub push_token: String,
    pub device_id: String,
    pub platform: DevicePlatform,
}

/// Registry seam used by the orchestrator.
///
/// Implementations must validate the token envelope and the session before
/// doing any I/O, and must report every failure through `Err` rather than
/// panicking.
pub trait TokenRegistry: Send + Sync {
    /// Insert-or-replace the registration for this device.
    fn register<'a>(
        &'a self,
        token: &'a str,
        identity: &'a DeviceIdentity,
        platform: DevicePlatform,
        session: &'a AuthSession,
    ) -> BoxFuture<'a, ApiResponse, PushError>;

    /// Patch the existing registration for this device.
    fn update<'a>(
        &'a self,
        token: &'a str,
        identity: &'a DeviceIdentity,
        platform: DevicePlatform,
        session: &'a AuthSession,
    ) -> BoxFuture<'a, ApiResponse, PushError>;
}

/// HTTP implementation of [`TokenRegistry`].
#[derive(Debug, Clone)]
pub struct RegistryClient {
    client: Client,
    base_url: String,
}

impl RegistryClient {
    pub fn new(config: &ApiConfig) -> Result<Self, PushError> {
        config
            .validate()
            .map_err(|issue| PushError::Config(issue.to_string()))?;
        let client = create_client(config.timeout_secs)?;
        Ok(Self::with_client(client, &config.base_url))
    }

    /// Uses an existing HTTP client, so the registry and inbox share a
    /// connection pool.
    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post_registration(
        &self,
        path: &str,
        operation: &str,
        token: &str,
        identity: &DeviceIdentity,
        platform: DevicePlatform,
        session: &AuthSession,
    ) -> Result<ApiResponse, PushError> {
        let token = PushToken::parse(token).inspect_err(|err| {
            warn!("Refusing to {} push token: {}", operation, err);
        })?;
        ensure_session(session)?;

        let payload = RegistrationPayload {
            push_token: token.into_inner(),
            device_id: identity.id.clone(),
            platform,
        };
        let url = endpoint(&self.base_url, path);
        debug!("{} push token for device {} at {}", operation, payload.device_id, url);

        let request = authorized(self.client.post(&url), session).json(&payload);
        let response: ApiResponse = send_json(request).await.inspect_err(|err| {
            warn!("Push token {} failed: {}", operation, err);
        })?;
        require_success(response.success, response.message.as_deref(), operation)
            .inspect_err(|err| warn!("Push token {} rejected: {}", operation, err))?;

        info!("Push token {} succeeded for device {}", operation, payload.device_id);
        Ok(response)
    }
}

impl TokenRegistry for RegistryClient {
    fn register<'a>(
        &'a self,
        token: &'a str,
        identity: &'a DeviceIdentity,
        platform: DevicePlatform,
        session: &'a AuthSession,
    ) -> BoxFuture<'a, ApiResponse, PushError> {
        Box::pin(self.post_registration(
            REGISTER_PATH,
            "register",
            token,
            identity,
            platform,
            session,
        ))
    }

    fn update<'a>(
        &'a self,
        token: &'a str,
        identity: &'a DeviceIdentity,
        platform: DevicePlatform,
        session: &'a AuthSession,
    ) -> BoxFuture<'a, ApiResponse, PushError> {
        Box::pin(self.post_registration(UPDATE_PATH, "update", token, identity, platform, session))
    }
}
