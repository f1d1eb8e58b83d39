//! Durable Local Storage Adapters
//!
//! Implementations of the [`StateStorage`] port. All values round-trip
//! through JSON, matching a string-keyed browser storage area:
//!
//! - [`MemoryStorage`]: in-process map, for tests and ephemeral sessions
//! - [`JsonFileStorage`]: one JSON object per file, for native shells

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::application::ports::StateStorage;

// =============================================================================
// Memory Storage
// =============================================================================

/// In-memory storage; contents die with the process.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: HashMap<String, serde_json::Value>,
}

impl MemoryStorage {
    /// Create empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStorage for MemoryStorage {
    fn load(&self, key: &str) -> Option<serde_json::Value> {
        self.values.get(key).cloned()
    }

    fn store(&mut self, key: &str, value: &serde_json::Value) {
        self.values.insert(key.to_string(), value.clone());
    }

    fn remove(&mut self, key: &str) {
        self.values.remove(key);
    }
}

// =============================================================================
// JSON File Storage
// =============================================================================

/// File-backed storage: all keys live in one JSON object, rewritten on
/// every store. Write volume is one object per user action, so the
/// rewrite-the-file strategy holds up fine.
#[derive(Debug)]
pub struct JsonFileStorage {
    path: PathBuf,
    values: HashMap<String, serde_json::Value>,
}

impl JsonFileStorage {
    /// Open (or create) storage at `path`.
    ///
    /// A missing or unreadable file starts empty: persisted state is
    /// best-effort display data, losing it only resets durations and
    /// history.
    #[must_use]
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = read_values(&path).unwrap_or_default();
        Self { path, values }
    }

    fn flush(&self) {
        let serialized = match serde_json::to_string(&self.values) {
            Ok(serialized) => serialized,
            Err(error) => {
                tracing::warn!(%error, "Failed to serialize local state");
                return;
            }
        };
        if let Err(error) = std::fs::write(&self.path, serialized) {
            tracing::warn!(path = %self.path.display(), %error, "Failed to write local state");
        }
    }
}

fn read_values(path: &Path) -> Option<HashMap<String, serde_json::Value>> {
    let contents = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&contents).ok()
}

impl StateStorage for JsonFileStorage {
    fn load(&self, key: &str) -> Option<serde_json::Value> {
        self.values.get(key).cloned()
    }

    fn store(&mut self, key: &str, value: &serde_json::Value) {
        self.values.insert(key.to_string(), value.clone());
        self.flush();
    }

    fn remove(&mut self, key: &str) {
        self.values.remove(key);
        self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_storage_round_trip() {
        let mut storage = MemoryStorage::new();
        assert!(storage.load("missing").is_none());

        storage.store("key", &serde_json::json!({"a": 1}));
        assert_eq!(storage.load("key"), Some(serde_json::json!({"a": 1})));

        storage.remove("key");
        assert!(storage.load("key").is_none());
    }

    #[test]
    fn file_storage_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        {
            let mut storage = JsonFileStorage::open(&path);
            storage.store("venue-cache", &serde_json::json!({"wrld_a": {"name": "Garden"}}));
        }

        let storage = JsonFileStorage::open(&path);
        assert_eq!(
            storage.load("venue-cache"),
            Some(serde_json::json!({"wrld_a": {"name": "Garden"}}))
        );
    }

    #[test]
    fn corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "not json").unwrap();

        let storage = JsonFileStorage::open(&path);
        assert!(storage.load("venue-cache").is_none());
    }
}
