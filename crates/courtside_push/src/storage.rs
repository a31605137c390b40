//! Key-value stores and the keys the push client persists.
//!
//! The device's own storage is reached through
//! [`courtside_common::KeyValueStore`]. This module provides two
//! implementations: [`MemoryStore`] for tests and throwaway sessions, and
//! [`JsonFileStore`], which keeps everything in one JSON object on disk.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use courtside_common::{storage_error, BoxFuture, CourtsideError, KeyValueStore};
use tracing::debug;

/// Persisted keys.
pub mod keys {
    /// Stable device identifier, written once per install.
    pub const DEVICE_ID: &str = "courtside.device_id";
    /// Set when the user declined the notification prompt.
    pub const PERMISSION_DENIED: &str = "courtside.push.permission_denied";
    /// Last token obtained from the platform.
    pub const PUSH_TOKEN: &str = "courtside.push.token";
    /// When the platform last handed out a different token.
    pub const TOKEN_UPDATED_AT: &str = "courtside.push.token_updated_at";
    /// Token the backend confirmed most recently.
    pub const REGISTERED_TOKEN: &str = "courtside.push.registered_token";
    /// Time of the last successful register or update call.
    pub const REGISTERED_AT: &str = "courtside.push.registered_at";
}

/// In-process store. Contents vanish with the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: Mutex::new(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }

    /// Copy of the current contents.
    pub fn snapshot(&self) -> HashMap<String, String> {
        self.lock().map(|entries| entries.clone()).unwrap_or_default()
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, CourtsideError> {
        self.entries
            .lock()
            .map_err(|_| storage_error("memory store lock poisoned"))
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> BoxFuture<'_, Option<String>, CourtsideError> {
        let result = self.lock().map(|entries| entries.get(key).cloned());
        Box::pin(async move { result })
    }

    fn set(&self, key: &str, value: &str) -> BoxFuture<'_, (), CourtsideError> {
        let result = self.lock().map(|mut entries| {
            entries.insert(key.to_string(), value.to_string());
        });
        Box::pin(async move { result })
    }

    fn remove(&self, key: &str) -> BoxFuture<'_, (), CourtsideError> {
        let result = self.lock().map(|mut entries| {
            entries.remove(key);
        });
        Box::pin(async move { result })
    }
}

/// Store backed by a single JSON object file.
///
/// Every `set`/`remove` rewrites the file through a temporary sibling and a
/// rename, so a crash never leaves a half-written document behind.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: tokio::sync::Mutex<BTreeMap<String, String>>,
}

impl JsonFileStore {
    /// Opens the store at `path`. A missing file is an empty store.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, CourtsideError> {
        let path = path.as_ref().to_path_buf();
        let entries = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.is_empty() => BTreeMap::new(),
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(err.into()),
        };
        debug!(
            "Opened key-value store at {} with {} entries",
            path.display(),
            entries.len()
        );

        Ok(Self {
            path,
            entries: tokio::sync::Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn write_through(
        &self,
        entries: &BTreeMap<String, String>,
    ) -> Result<(), CourtsideError> {
        let document = serde_json::to_vec_pretty(entries)?;
        let staging = self.path.with_extension("json.tmp");
        tokio::fs::write(&staging, document).await?;
        tokio::fs::rename(&staging, &self.path).await?;
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> BoxFuture<'_, Option<String>, CourtsideError> {
        let key = key.to_string();
        Box::pin(async move { Ok(self.entries.lock().await.get(&key).cloned()) })
    }

    fn set(&self, key: &str, value: &str) -> BoxFuture<'_, (), CourtsideError> {
        let key = key.to_string();
        let value = value.to_string();
        Box::pin(async move {
            let mut entries = self.entries.lock().await;
            entries.insert(key, value);
            self.write_through(&entries).await
        })
    }

    fn remove(&self, key: &str) -> BoxFuture<'_, (), CourtsideError> {
        let key = key.to_string();
        Box::pin(async move {
            let mut entries = self.entries.lock().await;
            if entries.remove(&key).is_some() {
                self.write_through(&entries).await?;
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "courtside-{}-{}.json",
            name,
            uuid::Uuid::new_v4().simple()
        ))
    }

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();
        assert_eq!(store.get(keys::DEVICE_ID).await.unwrap(), None);

        store.set(keys::DEVICE_ID, "ios_abc").await.unwrap();
        assert_eq!(
            store.get(keys::DEVICE_ID).await.unwrap().as_deref(),
            Some("ios_abc")
        );

        store.remove(keys::DEVICE_ID).await.unwrap();
        assert_eq!(store.get(keys::DEVICE_ID).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_json_file_store_survives_reopen() {
        let path = scratch_path("reopen");

        let store = JsonFileStore::open(&path).await.unwrap();
        store.set(keys::DEVICE_ID, "android_pixel-8_1234").await.unwrap();
        store.set(keys::PERMISSION_DENIED, "true").await.unwrap();
        store.remove(keys::PERMISSION_DENIED).await.unwrap();
        drop(store);

        let reopened = JsonFileStore::open(&path).await.unwrap();
        assert_eq!(
            reopened.get(keys::DEVICE_ID).await.unwrap().as_deref(),
            Some("android_pixel-8_1234")
        );
        assert_eq!(reopened.get(keys::PERMISSION_DENIED).await.unwrap(), None);

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_json_file_store_rejects_corrupt_file() {
        let path = scratch_path("corrupt");
        std::fs::write(&path, b"{ not json").unwrap();

        let result = JsonFileStore::open(&path).await;
        assert!(matches!(result, Err(CourtsideError::ParseError(_))));

        let _ = std::fs::remove_file(&path);
    }
}
