//! Locally mirrored token and registration state.
//!
//! Both records live in memory for the session and are mirrored to the
//! key-value store so a cold start can pick up where the last process left
//! off. Mirror reads and writes are best-effort: a failing store is logged
//! and treated as empty.

use chrono::{DateTime, Duration, Utc};
use courtside_common::KeyValueStore;
use tracing::warn;

use crate::storage::keys;

/// Token most recently handed out by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushTokenRecord {
    pub token: String,
    pub acquired_at: DateTime<Utc>,
}

impl PushTokenRecord {
    /// Record for `token` observed at `now`, keeping the original
    /// acquisition time when the platform returned the same token again.
    pub fn observe(previous: Option<&PushTokenRecord>, token: &str, now: DateTime<Utc>) -> Self {
        match previous {
            Some(record) if record.token == token => record.clone(),
            _ => Self {
                token: token.to_string(),
                acquired_at: now,
            },
        }
    }
}

/// What the backend is believed to hold for this device.
///
/// Only advanced after a successful register/update call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationState {
    pub last_registered_token: Option<String>,
    pub last_registered_at: Option<DateTime<Utc>>,
}

impl RegistrationState {
    pub fn confirmed(token: &str, at: DateTime<Utc>) -> Self {
        Self {
            last_registered_token: Some(token.to_string()),
            last_registered_at: Some(at),
        }
    }

    pub fn is_registered(&self) -> bool {
        self.last_registered_token.is_some()
    }

    /// True when no successful call happened within `window` of `now`.
    ///
    /// A confirmation time ahead of `now` means the clock moved backwards;
    /// it is treated as stale so heartbeats resume right away.
    pub fn is_stale(&self, now: DateTime<Utc>, window: Duration) -> bool {
        match self.last_registered_at {
            Some(at) => {
                let elapsed = now.signed_duration_since(at);
                elapsed < Duration::zero() || elapsed > window
            }
            None => true,
        }
    }
}

pub(crate) async fn load_token_record(store: &dyn KeyValueStore) -> Option<PushTokenRecord> {
    let token = read(store, keys::PUSH_TOKEN).await?;
    let acquired_at = read(store, keys::TOKEN_UPDATED_AT)
        .await
        .and_then(|raw| parse_timestamp(&raw))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    Some(PushTokenRecord { token, acquired_at })
}

pub(crate) async fn save_token_record(store: &dyn KeyValueStore, record: &PushTokenRecord) {
    write(store, keys::PUSH_TOKEN, &record.token).await;
    write(store, keys::TOKEN_UPDATED_AT, &record.acquired_at.to_rfc3339()).await;
}

pub(crate) async fn load_registration(store: &dyn KeyValueStore) -> RegistrationState {
    RegistrationState {
        last_registered_token: read(store, keys::REGISTERED_TOKEN).await,
        last_registered_at: read(store, keys::REGISTERED_AT)
            .await
            .and_then(|raw| parse_timestamp(&raw)),
    }
}

pub(crate) async fn save_registration(store: &dyn KeyValueStore, state: &RegistrationState) {
    if let Some(token) = &state.last_registered_token {
        write(store, keys::REGISTERED_TOKEN, token).await;
    }
    match state.last_registered_at {
        Some(at) => write(store, keys::REGISTERED_AT, &at.to_rfc3339()).await,
        // Cleared freshness forces a heartbeat on the next check.
        None => {
            if let Err(err) = store.remove(keys::REGISTERED_AT).await {
                warn!("Failed to clear {}: {}", keys::REGISTERED_AT, err);
            }
        }
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|err| warn!("Ignoring unreadable timestamp {:?}: {}", raw, err))
        .ok()
}

async fn read(store: &dyn KeyValueStore, key: &str) -> Option<String> {
    match store.get(key).await {
        Ok(value) => value.filter(|v| !v.is_empty()),
        Err(err) => {
            warn!("Failed to read {}: {}", key, err);
            None
        }
    }
}

async fn write(store: &dyn KeyValueStore, key: &str, value: &str) {
    if let Err(err) = store.set(key, value).await {
        warn!("Failed to persist {}: {}", key, err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn test_observe_keeps_acquisition_time_for_same_token() {
        let first = Utc::now() - Duration::hours(3);
        let previous = PushTokenRecord {
            token: "ExponentPushToken[a]".into(),
            acquired_at: first,
        };

        let same = PushTokenRecord::observe(Some(&previous), "ExponentPushToken[a]", Utc::now());
        assert_eq!(same.acquired_at, first);

        let now = Utc::now();
        let rotated = PushTokenRecord::observe(Some(&previous), "ExponentPushToken[b]", now);
        assert_eq!(rotated.acquired_at, now);
        assert_eq!(rotated.token, "ExponentPushToken[b]");
    }

    #[test]
    fn test_staleness_boundary() {
        let now = Utc::now();
        let window = Duration::hours(12);

        assert!(RegistrationState::default().is_stale(now, window));
        let at_edge = RegistrationState::confirmed("t", now - Duration::hours(12));
        assert!(!at_edge.is_stale(now, window));
        assert!(RegistrationState::confirmed("t", now - Duration::hours(13)).is_stale(now, window));
    }

    #[test]
    fn test_confirmation_from_the_future_is_stale() {
        let now = Utc::now();
        let window = Duration::hours(12);

        let ahead = RegistrationState::confirmed("t", now + Duration::minutes(30));
        assert!(ahead.is_stale(now, window));
        assert!(!RegistrationState::confirmed("t", now).is_stale(now, window));
    }

    #[tokio::test]
    async fn test_registration_mirror_roundtrip() {
        let store = MemoryStore::new();
        assert_eq!(load_registration(&store).await, RegistrationState::default());

        let at = DateTime::parse_from_rfc3339("2026-03-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let state = RegistrationState::confirmed("ExponentPushToken[a]", at);
        save_registration(&store, &state).await;

        assert_eq!(load_registration(&store).await, state);
    }

    #[tokio::test]
    async fn test_unreadable_timestamp_counts_as_missing() {
        let store = MemoryStore::with_entries([
            (keys::REGISTERED_TOKEN, "ExponentPushToken[a]"),
            (keys::REGISTERED_AT, "yesterday-ish"),
        ]);

        let state = load_registration(&store).await;
        assert_eq!(state.last_registered_token.as_deref(), Some("ExponentPushToken[a]"));
        assert!(state.last_registered_at.is_none());
    }
}
