//! Zefest Local Storage Module
//! Narrow key/value access to the client's persisted state (tokens, profile, version markers)

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

/// Every key the client persists, with its on-device name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageKey {
    AccessToken,
    RefreshToken,
    User,
    InstalledVersion,
    DismissedVersion,
    /// Reserved. Written by older app builds' update check and never read here;
    /// kept so stores carried over from them are still cleared on logout.
    AppVersion,
    FcmToken,
}

impl StorageKey {
    pub const ALL: [StorageKey; 7] = [
        StorageKey::AccessToken,
        StorageKey::RefreshToken,
        StorageKey::User,
        StorageKey::InstalledVersion,
        StorageKey::DismissedVersion,
        StorageKey::AppVersion,
        StorageKey::FcmToken,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKey::AccessToken => "access_token",
            StorageKey::RefreshToken => "refresh_token",
            StorageKey::User => "user",
            StorageKey::InstalledVersion => "app_installed_version",
            StorageKey::DismissedVersion => "app_dismissed_version",
            StorageKey::AppVersion => "app_version",
            StorageKey::FcmToken => "fcm_token",
        }
    }
}

impl std::fmt::Display for StorageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Storage seam shared by the session, the update controller and the back guard.
///
/// Reads never fail: a value that cannot be read is treated as absent.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: StorageKey) -> Option<String>;
    fn set(&self, key: StorageKey, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: StorageKey) -> Result<(), StorageError>;
    fn clear(&self) -> Result<(), StorageError>;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// In-memory store for tests and throwaway sessions
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<StorageKey, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_values(values: &[(StorageKey, &str)]) -> Self {
        let store = Self::new();
        {
            let mut map = lock(&store.values);
            for (key, value) in values {
                map.insert(*key, value.to_string());
            }
        }
        store
    }

    pub fn len(&self) -> usize {
        lock(&self.values).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: StorageKey) -> Option<String> {
        lock(&self.values).get(&key).cloned()
    }

    fn set(&self, key: StorageKey, value: &str) -> Result<(), StorageError> {
        lock(&self.values).insert(key, value.to_string());
        Ok(())
    }

    fn remove(&self, key: StorageKey) -> Result<(), StorageError> {
        lock(&self.values).remove(&key);
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        lock(&self.values).clear();
        Ok(())
    }
}

/// Store persisted as a single JSON object keyed by the on-device names
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
}

impl JsonFileStore {
    /// Open the store, reading existing content if the file is present
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let values = if path.exists() {
            let content = fs::read_to_string(path)?;
            if content.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&content)?
            }
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path: path.to_path_buf(),
            values: Mutex::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, values: &BTreeMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(values)?;

        // Write to temp file first, then rename (atomic)
        let temp_path = self.path.with_extension("tmp");
        fs::write(&temp_path, &content)?;
        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: StorageKey) -> Option<String> {
        lock(&self.values).get(key.as_str()).cloned()
    }

    fn set(&self, key: StorageKey, value: &str) -> Result<(), StorageError> {
        let mut values = lock(&self.values);
        values.insert(key.as_str().to_string(), value.to_string());
        self.persist(&values)
    }

    fn remove(&self, key: StorageKey) -> Result<(), StorageError> {
        let mut values = lock(&self.values);
        if values.remove(key.as_str()).is_some() {
            self.persist(&values)?;
        }
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        let mut values = lock(&self.values);
        values.clear();
        self.persist(&values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_key_names() {
        assert_eq!(StorageKey::InstalledVersion.as_str(), "app_installed_version");
        assert_eq!(StorageKey::DismissedVersion.as_str(), "app_dismissed_version");
        assert_eq!(StorageKey::AccessToken.to_string(), "access_token");
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryStore::new();
        assert!(store.get(StorageKey::FcmToken).is_none());

        store.set(StorageKey::FcmToken, "tok").unwrap();
        assert_eq!(store.get(StorageKey::FcmToken).as_deref(), Some("tok"));

        store.remove(StorageKey::FcmToken).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_file_store_persists_across_opens() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("storage.json");

        let store = JsonFileStore::open(&path).unwrap();
        store.set(StorageKey::InstalledVersion, "2.0.0").unwrap();
        store.set(StorageKey::AccessToken, "abc").unwrap();
        drop(store);

        let reopened = JsonFileStore::open(&path).unwrap();
        assert_eq!(reopened.get(StorageKey::InstalledVersion).as_deref(), Some("2.0.0"));

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["access_token"], "abc");
    }

    #[test]
    fn test_legacy_app_version_key_is_cleared() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("storage.json");
        fs::write(&path, r#"{"app_version":"0.9.0","access_token":"abc"}"#).unwrap();

        let store = JsonFileStore::open(&path).unwrap();
        assert_eq!(store.get(StorageKey::AppVersion).as_deref(), Some("0.9.0"));

        store.clear().unwrap();
        let reopened = JsonFileStore::open(&path).unwrap();
        assert!(StorageKey::ALL.iter().all(|key| reopened.get(*key).is_none()));
    }

    #[test]
    fn test_file_store_clear() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("storage.json");

        let store = JsonFileStore::open(&path).unwrap();
        store.set(StorageKey::User, "{}").unwrap();
        store.clear().unwrap();

        let reopened = JsonFileStore::open(&path).unwrap();
        assert!(reopened.get(StorageKey::User).is_none());
    }
}
