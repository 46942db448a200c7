//! Persistent local storage for cached lists, the stored user and cookies.
//!
//! Values are JSON documents addressed by string keys. Cached lists are
//! wrapped in [`Timestamped`] so readers can decide whether they are still
//! fresh. Two backends exist: [`FileStorage`] (one file per key) and
//! [`MemoryStorage`] (process-local, used by tests and when no data directory
//! is configured).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;
use tracing::warn;

/// Storage keys used by the session and stores.
pub mod keys {
    /// Cached cart lines.
    pub const CART: &str = "larkspur_cart";
    /// Cached wishlist entries.
    pub const WISHLIST: &str = "larkspur_wishlist";
    /// Prefix for product listing caches, followed by the filter signature.
    pub const PRODUCTS: &str = "larkspur_products";
    /// Stored copy of the logged-in user.
    pub const USER: &str = "user";
    /// Stored bearer token.
    pub const ACCESS_TOKEN: &str = "accessToken";
    /// Cookies persisted between runs for the API origin.
    pub const API_COOKIES: &str = "apiCookies";
}

/// Cookie names read by route gating on the web front end.
pub mod cookies {
    /// Plain-text lowercase role of the logged-in user.
    pub const USER_ROLE: &str = "userRole";
    /// Lifetime of the role cookie in days.
    pub const USER_ROLE_DAYS: i64 = 7;
}

const COOKIE_PREFIX: &str = "cookie.";

/// Errors raised by storage backends.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("storage lock poisoned")]
    Poisoned,
}

/// A raw key-value backend.
pub trait StorageBackend: Send + Sync + 'static {
    /// Read the raw value for a key.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn read(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write the raw value for a key, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn write(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove a key. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be modified.
    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// List every stored key.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be listed.
    fn keys(&self) -> Result<Vec<String>, StorageError>;
}

/// In-memory backend.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    /// Create an empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for MemoryStorage {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        entries.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        let entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(entries.keys().cloned().collect())
    }
}

/// File-per-key backend rooted at a directory.
///
/// Keys are percent-encoded into file names, so any key is safe to use.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    /// Open (and create if needed) a storage directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, StorageError> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let encoded: String = url::form_urlencoded::byte_serialize(key.as_bytes()).collect();
        self.root.join(format!("{encoded}.json"))
    }
}

impl StorageBackend for FileStorage {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        // Write-then-rename so a crash never leaves a half-written document
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value)?;
        std::fs::rename(tmp, path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        let mut keys = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let name = entry?.file_name();
            let Some(encoded) = name.to_str().and_then(|n| n.strip_suffix(".json")) else {
                continue;
            };
            let decoded: String = url::form_urlencoded::parse(format!("k={encoded}").as_bytes())
                .map(|(_, v)| v.into_owned())
                .next()
                .unwrap_or_default();
            keys.push(decoded);
        }
        Ok(keys)
    }
}

/// A value stored together with its write time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamped<T> {
    pub data: T,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl<T> Timestamped<T> {
    /// Wrap a value with the current time.
    pub fn now(data: T) -> Self {
        Self {
            data,
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    /// Whether the value is older than `max_age`.
    #[must_use]
    pub fn is_expired(&self, max_age: Duration) -> bool {
        let max_age_ms = i64::try_from(max_age.as_millis()).unwrap_or(i64::MAX);
        Utc::now().timestamp_millis().saturating_sub(self.timestamp) > max_age_ms
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CookieRecord {
    value: String,
    expires_at: DateTime<Utc>,
}

/// Typed facade over a [`StorageBackend`].
///
/// Cheap to clone. Read failures are logged and treated as "absent" so a
/// corrupt cache never takes the store down; write failures are returned.
#[derive(Clone)]
pub struct LocalStorage {
    backend: Arc<dyn StorageBackend>,
}

impl std::fmt::Debug for LocalStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalStorage").finish_non_exhaustive()
    }
}

impl LocalStorage {
    /// Wrap a backend.
    pub fn new(backend: impl StorageBackend) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    /// Process-local storage.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(MemoryStorage::new())
    }

    /// Read and decode a value.
    #[must_use]
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.backend.read(key) {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(key, error = %e, "Failed to read local storage");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "Discarding undecodable local storage entry");
                None
            }
        }
    }

    /// Encode and write a value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be encoded or written.
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let raw = serde_json::to_string(value)?;
        self.backend.write(key, &raw)
    }

    /// Remove a key.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be modified.
    pub fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.backend.remove(key)
    }

    /// Stored keys starting with `prefix`, sorted. Listing failures yield none.
    #[must_use]
    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        match self.backend.keys() {
            Ok(mut keys) => {
                keys.retain(|k| k.starts_with(prefix));
                keys.sort();
                keys
            }
            Err(e) => {
                warn!(prefix, error = %e, "Failed to list local storage");
                Vec::new()
            }
        }
    }

    /// Remove every key starting with `prefix`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be listed or modified.
    pub fn remove_prefix(&self, prefix: &str) -> Result<usize, StorageError> {
        let mut removed = 0;
        for key in self.backend.keys()? {
            if key.starts_with(prefix) {
                self.backend.remove(&key)?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Remove everything.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be listed or modified.
    pub fn clear(&self) -> Result<(), StorageError> {
        self.remove_prefix("").map(|_| ())
    }

    /// Write a value wrapped with the current time.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be encoded or written.
    pub fn set_with_timestamp<T: Serialize>(&self, key: &str, data: &T) -> Result<(), StorageError> {
        self.set(key, &Timestamped::now(data))
    }

    /// Read a timestamped value.
    ///
    /// With `max_age`, an expired entry reads as absent but stays stored so a
    /// later `None` read can still fall back to it. Without it, any stored
    /// entry is returned regardless of age.
    #[must_use]
    pub fn get_with_timestamp<T: DeserializeOwned>(
        &self,
        key: &str,
        max_age: Option<Duration>,
    ) -> Option<Timestamped<T>> {
        let entry: Timestamped<T> = self.get(key)?;
        match max_age {
            Some(max_age) if entry.is_expired(max_age) => None,
            _ => Some(entry),
        }
    }

    /// Set a cookie that expires after `days`.
    ///
    /// # Errors
    ///
    /// Returns an error if the cookie cannot be written.
    pub fn set_cookie(&self, name: &str, value: &str, days: i64) -> Result<(), StorageError> {
        let record = CookieRecord {
            value: value.to_string(),
            expires_at: Utc::now() + chrono::Duration::days(days),
        };
        self.set(&format!("{COOKIE_PREFIX}{name}"), &record)
    }

    /// Read a cookie if it exists and has not expired.
    #[must_use]
    pub fn get_cookie(&self, name: &str) -> Option<String> {
        let record: CookieRecord = self.get(&format!("{COOKIE_PREFIX}{name}"))?;
        (record.expires_at > Utc::now()).then_some(record.value)
    }

    /// Delete a cookie.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be modified.
    pub fn delete_cookie(&self, name: &str) -> Result<(), StorageError> {
        self.remove(&format!("{COOKIE_PREFIX}{name}"))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Items {
        items: Vec<String>,
    }

    #[test]
    fn test_timestamped_roundtrip_and_expiry() {
        let storage = LocalStorage::in_memory();
        let value = Items {
            items: vec!["a".into()],
        };
        storage.set_with_timestamp(keys::CART, &value).unwrap();

        let fresh = storage
            .get_with_timestamp::<Items>(keys::CART, Some(Duration::from_secs(60)))
            .unwrap();
        assert_eq!(fresh.data, value);

        // Age the entry past the window
        let stale = Timestamped {
            data: value,
            timestamp: Utc::now().timestamp_millis() - 120_000,
        };
        storage.set(keys::CART, &stale).unwrap();
        assert!(storage.get_with_timestamp::<Items>(keys::CART, None).is_some());
        assert!(storage
            .get_with_timestamp::<Items>(keys::CART, Some(Duration::from_secs(60)))
            .is_none());
        // An expired read leaves the entry in place for fallback
        assert!(storage.get_with_timestamp::<Items>(keys::CART, None).is_some());
    }

    #[test]
    fn test_undecodable_entry_reads_as_absent() {
        let storage = LocalStorage::in_memory();
        storage.set(keys::WISHLIST, "not an object").unwrap();
        assert!(storage.get::<Items>(keys::WISHLIST).is_none());
    }

    #[test]
    fn test_cookie_expiry() {
        let storage = LocalStorage::in_memory();
        storage.set_cookie(cookies::USER_ROLE, "admin", 7).unwrap();
        assert_eq!(storage.get_cookie(cookies::USER_ROLE).as_deref(), Some("admin"));
        storage.set_cookie(cookies::USER_ROLE, "admin", -1).unwrap();
        assert!(storage.get_cookie(cookies::USER_ROLE).is_none());
        storage.delete_cookie(cookies::USER_ROLE).unwrap();
    }

    #[test]
    fn test_remove_prefix_only_touches_matching_keys() {
        let storage = LocalStorage::in_memory();
        storage.set("larkspur_products:all", &1).unwrap();
        storage.set("larkspur_products:category=a", &2).unwrap();
        storage.set(keys::CART, &3).unwrap();
        assert_eq!(storage.remove_prefix(keys::PRODUCTS).unwrap(), 2);
        assert_eq!(storage.get::<i32>(keys::CART), Some(3));
    }

    #[test]
    fn test_file_storage_encodes_keys() {
        let dir = std::env::temp_dir().join(format!("larkspur-storage-{}", uuid::Uuid::new_v4()));
        let storage = LocalStorage::new(FileStorage::open(&dir).unwrap());
        let key = "larkspur_products:category=shirts&sortBy=price";
        storage.set(key, &vec![1, 2, 3]).unwrap();
        assert_eq!(storage.get::<Vec<i32>>(key), Some(vec![1, 2, 3]));
        assert_eq!(storage.remove_prefix(keys::PRODUCTS).unwrap(), 1);
        assert!(storage.get::<Vec<i32>>(key).is_none());
        std::fs::remove_dir_all(dir).unwrap();
    }
}
