//! ==============================================================================
//! storage.rs - persisted key-value store
//! ==============================================================================
//!
//! purpose:
//!     provides the small synchronous string key-value store the console
//!     persists its session, theme and thresholds into.
//!     abstracts away the difference between a throwaway in-memory map
//!     (tests, `storage.path` unset) and a json file on disk.
//!
//! keys:
//!     - authToken  : opaque mock bearer token (see token.rs)
//!     - user       : serialized `User`
//!     - rememberMe : "true" | "false"
//!     - theme      : "light" | "dark"
//!     - thresholds : serialized `ThresholdSettings`
//!
//! relationships:
//!     - used by: session.rs, thresholds.rs, theme.rs
//!     - created by: context.rs (from config.rs `[storage]`)
//!
//! ==============================================================================

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

pub const AUTH_TOKEN_KEY: &str = "authToken";
pub const USER_KEY: &str = "user";
pub const REMEMBER_ME_KEY: &str = "rememberMe";
pub const THEME_KEY: &str = "theme";
pub const THRESHOLDS_KEY: &str = "thresholds";

/// the keys cleared on logout
pub const AUTH_KEYS: [&str; 3] = [AUTH_TOKEN_KEY, USER_KEY, REMEMBER_ME_KEY];

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode store: {0}")]
    Encode(#[from] serde_json::Error),
}

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

pub type SharedStore = Arc<dyn KeyValueStore>;

/// recover the map even if a writer panicked while holding the lock
fn lock(map: &Mutex<BTreeMap<String, String>>) -> MutexGuard<'_, BTreeMap<String, String>> {
    map.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ==============================================================================================
// IN-MEMORY IMPLEMENTATION
// ==============================================================================================

#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedStore {
        Arc::new(Self::new())
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        lock(&self.entries).get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        lock(&self.entries).insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        lock(&self.entries).remove(key);
        Ok(())
    }
}

// ==============================================================================================
// FILE IMPLEMENTATION
// ==============================================================================================

/// a single json object file, rewritten on every change
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// open the store; a missing file starts empty, a corrupt one is logged and ignored
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let entries = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<BTreeMap<String, String>>(&content) {
                Ok(map) => {
                    tracing::debug!(path = %path.display(), keys = map.len(), "[STORAGE] loaded");
                    map
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "[STORAGE] corrupt store, starting empty");
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "[STORAGE] unreadable store, starting empty");
                BTreeMap::new()
            }
        };
        Self { path, entries: Mutex::new(entries) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, entries: &BTreeMap<String, String>) -> Result<(), StorageError> {
        let content = serde_json::to_string_pretty(entries)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|source| StorageError::Io { path: parent.to_path_buf(), source })?;
        }
        std::fs::write(&self.path, content)
            .map_err(|source| StorageError::Io { path: self.path.clone(), source })
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        lock(&self.entries).get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = lock(&self.entries);
        entries.insert(key.to_string(), value.to_string());
        self.flush(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = lock(&self.entries);
        if entries.remove(key).is_some() {
            self.flush(&entries)?;
        }
        Ok(())
    }
}
