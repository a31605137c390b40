//! Stable per-install device identity.
//!
//! The identifier is synthesized once, persisted, and from then on read back
//! unchanged. The persisted value is the only source of truth: platform
//! identifiers that change across reinstalls are never consulted again.

use std::sync::Arc;

use courtside_common::{DevicePlatform, KeyValueStore, PushPlatform};
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::storage::keys;

/// Origin of a device identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformTag {
    Ios,
    Android,
    /// The hardware signal was unavailable; the id is purely random.
    Fallback,
}

impl PlatformTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformTag::Ios => "ios",
            PlatformTag::Android => "android",
            PlatformTag::Fallback => "fallback",
        }
    }

    /// Recovers the tag from a persisted identifier's prefix.
    pub fn from_id(id: &str) -> Self {
        match id.split('_').next() {
            Some("ios") => PlatformTag::Ios,
            Some("android") => PlatformTag::Android,
            _ => PlatformTag::Fallback,
        }
    }
}

impl From<DevicePlatform> for PlatformTag {
    fn from(platform: DevicePlatform) -> Self {
        match platform {
            DevicePlatform::Ios => PlatformTag::Ios,
            DevicePlatform::Android => PlatformTag::Android,
        }
    }
}

/// Identifier of this installation, independent of the push token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub id: String,
    pub platform_tag: PlatformTag,
}

impl DeviceIdentity {
    fn from_persisted(id: String) -> Self {
        let platform_tag = PlatformTag::from_id(&id);
        Self { id, platform_tag }
    }
}

/// Resolves the device identity, creating and persisting it on first use.
pub struct DeviceIdentityStore {
    store: Arc<dyn KeyValueStore>,
    platform: Arc<dyn PushPlatform>,
    resolved: OnceCell<DeviceIdentity>,
}

impl DeviceIdentityStore {
    pub fn new(store: Arc<dyn KeyValueStore>, platform: Arc<dyn PushPlatform>) -> Self {
        Self {
            store,
            platform,
            resolved: OnceCell::new(),
        }
    }

    /// Returns the persisted identity, creating one if none exists.
    ///
    /// Never fails: storage errors are logged, and a failing hardware probe
    /// yields a `fallback` identity. Once resolved, the same value is
    /// returned for the lifetime of this store even if persisting failed.
    ///
    /// A new id is only written when the store confirmed that none exists.
    /// If the read itself fails, the identity is kept for this session only
    /// and the persisted id, if any, stays untouched.
    pub async fn get_or_create(&self) -> DeviceIdentity {
        self.resolved
            .get_or_init(|| async {
                match self.store.get(keys::DEVICE_ID).await {
                    Ok(Some(id)) if !id.trim().is_empty() => {
                        debug!("Using persisted device id {}", id);
                        return DeviceIdentity::from_persisted(id);
                    }
                    Ok(_) => {}
                    Err(err) => {
                        let identity = synthesize(self.platform.as_ref());
                        warn!(
                            "Failed to read device id, using {} for this session only: {}",
                            identity.id, err
                        );
                        return identity;
                    }
                }

                let identity = synthesize(self.platform.as_ref());
                if let Err(err) = self.store.set(keys::DEVICE_ID, &identity.id).await {
                    warn!("Failed to persist device id {}: {}", identity.id, err);
                }
                info!(
                    "Created device id {} ({})",
                    identity.id,
                    identity.platform_tag.as_str()
                );
                identity
            })
            .await
            .clone()
    }
}

/// Builds `{tag}_{model}_{random}`, or `fallback_{random}` when the
/// hardware probe fails.
fn synthesize(platform: &dyn PushPlatform) -> DeviceIdentity {
    let suffix = Uuid::new_v4().simple().to_string();

    match platform.device_model() {
        Ok(model) => {
            let tag = PlatformTag::from(platform.device_platform());
            let id = match model.as_deref().map(sanitize_model) {
                Some(model) if !model.is_empty() => {
                    format!("{}_{}_{}", tag.as_str(), model, suffix)
                }
                _ => format!("{}_{}", tag.as_str(), suffix),
            };
            DeviceIdentity {
                id,
                platform_tag: tag,
            }
        }
        Err(err) => {
            warn!("Device model unavailable, using a random device id: {}", err);
            DeviceIdentity {
                id: format!("{}_{}", PlatformTag::Fallback.as_str(), suffix),
                platform_tag: PlatformTag::Fallback,
            }
        }
    }
}

// Underscores separate the id segments, so they may not appear in the model.
fn sanitize_model(model: &str) -> String {
    model
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | ',' | '-') {
                c
            } else {
                '-'
            }
        })
        .collect()
}
