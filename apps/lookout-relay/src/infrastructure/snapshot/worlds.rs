//! In-Memory World Cache
//!
//! Caches world metadata for snapshot enrichment. Entries expire after a
//! fixed TTL; an entry exactly at the TTL boundary counts as expired. The
//! cache lives for the process only — the relay persists nothing.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

/// Cached world metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorldInfo {
    /// Display name.
    pub name: String,
    /// Thumbnail URL.
    pub thumbnail: Option<String>,
    /// Instance capacity.
    pub capacity: Option<u32>,
}

#[derive(Debug)]
struct CacheEntry {
    info: WorldInfo,
    cached_at: Instant,
}

/// TTL-bounded world metadata cache.
#[derive(Debug)]
pub struct WorldCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl WorldCache {
    /// Create a cache with the given TTL.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Read-through lookup. Expired entries are evicted and not returned.
    #[must_use]
    pub fn get(&self, world_id: &str) -> Option<WorldInfo> {
        {
            let entries = self.entries.read();
            let entry = entries.get(world_id)?;
            if entry.cached_at.elapsed() < self.ttl {
                return Some(entry.info.clone());
            }
        }
        // Lazy expiry: drop the stale entry on the next lookup.
        self.entries.write().remove(world_id);
        None
    }

    /// Write-through insert after a successful fetch.
    pub fn insert(&self, world_id: impl Into<String>, info: WorldInfo) {
        self.entries.write().insert(
            world_id.into(),
            CacheEntry {
                info,
                cached_at: Instant::now(),
            },
        );
    }

    /// Number of live (possibly stale) entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(name: &str) -> WorldInfo {
        WorldInfo {
            name: name.to_string(),
            thumbnail: None,
            capacity: Some(32),
        }
    }

    #[test]
    fn fresh_entries_are_returned() {
        let cache = WorldCache::new(Duration::from_secs(60));
        cache.insert("wrld_a", info("The Garden"));
        assert_eq!(cache.get("wrld_a"), Some(info("The Garden")));
    }

    #[test]
    fn missing_entries_are_none() {
        let cache = WorldCache::new(Duration::from_secs(60));
        assert!(cache.get("wrld_missing").is_none());
    }

    #[test]
    fn expired_entries_are_evicted() {
        let cache = WorldCache::new(Duration::ZERO);
        cache.insert("wrld_a", info("The Garden"));
        // TTL of zero means every entry is already at the boundary, which
        // counts as expired.
        assert!(cache.get("wrld_a").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn insert_refreshes_existing_entry() {
        let cache = WorldCache::new(Duration::from_secs(60));
        cache.insert("wrld_a", info("Old Name"));
        cache.insert("wrld_a", info("New Name"));
        assert_eq!(cache.get("wrld_a").map(|w| w.name), Some("New Name".to_string()));
        assert_eq!(cache.len(), 1);
    }
}
