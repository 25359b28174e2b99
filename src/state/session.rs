//! Persisted session (access token + cached user profile).
//!
//! SYSTEM CONTEXT
//! ==============
//! The HTTP client reads the token from here before every request and the
//! auth context restores the cached profile from here on startup. All
//! readers and writers go through `save`/`load`/`clear`.
//!
//! DESIGN
//! ======
//! Storage is a flat string key-value map, the same shape as browser
//! `localStorage`. Multi-key writes go through `set_items`/`remove_items` so
//! the token and the profile are always written or removed together.

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::StorageError;
use crate::net::types::{Session, User};

/// Storage key for the raw bearer token.
pub const ACCESS_TOKEN_KEY: &str = "access_token";
/// Storage key for the JSON-serialized user profile.
pub const USER_KEY: &str = "user";

/// Client-local string key-value storage.
pub trait Storage: Send + Sync {
    /// Read one value.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write all pairs in a single atomic step.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be written.
    fn set_items(&self, items: &[(&str, String)]) -> Result<(), StorageError>;

    /// Remove all keys in a single atomic step. Missing keys are not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be written.
    fn remove_items(&self, keys: &[&str]) -> Result<(), StorageError>;
}

// =============================================================================
// MEMORY STORAGE
// =============================================================================

/// In-process storage; lives as long as the value does.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: Mutex<BTreeMap<String, String>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let items = self.items.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(items.get(key).cloned())
    }

    fn set_items(&self, pairs: &[(&str, String)]) -> Result<(), StorageError> {
        let mut items = self.items.lock().map_err(|_| StorageError::Poisoned)?;
        for (key, value) in pairs {
            items.insert((*key).to_owned(), value.clone());
        }
        Ok(())
    }

    fn remove_items(&self, keys: &[&str]) -> Result<(), StorageError> {
        let mut items = self.items.lock().map_err(|_| StorageError::Poisoned)?;
        for key in keys {
            items.remove(*key);
        }
        Ok(())
    }
}

// =============================================================================
// FILE STORAGE
// =============================================================================

/// JSON-object file storage that survives process restarts.
///
/// Every write replaces the whole file through a sibling temp file and a
/// rename, so a crash never leaves half of a multi-key update on disk.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStorage {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), lock: Mutex::new(()) }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Result<BTreeMap<String, String>, StorageError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(error) => return Err(error.into()),
        };
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_str(&raw)?)
    }

    fn write_map(&self, items: &BTreeMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        write_private(&tmp, &serde_json::to_vec_pretty(items)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// Write `bytes` to a fresh file readable only by the owner (0600 on unix).
fn write_private(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    // The mode only applies on creation, so a leftover temp file must go first.
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
        Err(error) => return Err(error),
    }
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

impl Storage for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let _held = self.lock.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(self.read_map()?.remove(key))
    }

    fn set_items(&self, pairs: &[(&str, String)]) -> Result<(), StorageError> {
        let _held = self.lock.lock().map_err(|_| StorageError::Poisoned)?;
        let mut items = self.read_map()?;
        for (key, value) in pairs {
            items.insert((*key).to_owned(), value.clone());
        }
        self.write_map(&items)
    }

    fn remove_items(&self, keys: &[&str]) -> Result<(), StorageError> {
        let _held = self.lock.lock().map_err(|_| StorageError::Poisoned)?;
        let mut items = match self.read_map() {
            Ok(items) => items,
            // A corrupt file is discarded wholesale; clearing must always succeed.
            Err(StorageError::Json(_)) => BTreeMap::new(),
            Err(error) => return Err(error),
        };
        for key in keys {
            items.remove(*key);
        }
        if items.is_empty() {
            return match std::fs::remove_file(&self.path) {
                Ok(()) => Ok(()),
                Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(error) => Err(error.into()),
            };
        }
        self.write_map(&items)
    }
}

// =============================================================================
// SESSION STORE
// =============================================================================

/// Typed view over [`Storage`] holding the current session.
///
/// Cheap to clone; clones share the same backing storage.
#[derive(Clone)]
pub struct SessionStore {
    storage: Arc<dyn Storage>,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore").finish_non_exhaustive()
    }
}

impl SessionStore {
    #[must_use]
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Session store backed by a JSON file.
    #[must_use]
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::new(Arc::new(FileStorage::new(path)))
    }

    /// Session store that lives only in memory.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    /// Persist token and profile together.
    ///
    /// # Errors
    ///
    /// Returns an error if the profile cannot be serialized or storage fails.
    pub fn save(&self, token: &str, user: &User) -> Result<(), StorageError> {
        let user_json = serde_json::to_string(user)?;
        self.storage
            .set_items(&[(ACCESS_TOKEN_KEY, token.to_owned()), (USER_KEY, user_json)])?;
        tracing::debug!(user_id = user.id, "session saved");
        Ok(())
    }

    /// Return the persisted session without checking token freshness.
    ///
    /// `Ok(None)` when either half is missing.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Corrupt`] if the stored profile does not decode.
    pub fn load(&self) -> Result<Option<Session>, StorageError> {
        let Some(token) = self.storage.get_item(ACCESS_TOKEN_KEY)? else {
            return Ok(None);
        };
        let Some(user_json) = self.storage.get_item(USER_KEY)? else {
            return Ok(None);
        };
        let user = serde_json::from_str::<User>(&user_json)
            .map_err(|error| StorageError::Corrupt { key: USER_KEY, message: error.to_string() })?;
        Ok(Some(Session { token, user }))
    }

    /// Read only the bearer token.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be read.
    pub fn token(&self) -> Result<Option<String>, StorageError> {
        self.storage.get_item(ACCESS_TOKEN_KEY)
    }

    /// Remove token and profile together. Clearing an empty store is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be written.
    pub fn clear(&self) -> Result<(), StorageError> {
        self.storage.remove_items(&[ACCESS_TOKEN_KEY, USER_KEY])?;
        tracing::debug!("session cleared");
        Ok(())
    }
}
