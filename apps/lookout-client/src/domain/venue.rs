//! Venue Metadata Cache
//!
//! World name/thumbnail cache persisted to durable local storage. Entries
//! expire after a fixed TTL; an entry exactly at the TTL boundary counts as
//! expired. Reads are read-through (the reconciler fetches on a miss) and
//! fetch results are written through.

use std::collections::HashMap;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Cache TTL: one day.
pub const VENUE_CACHE_TTL_HOURS: i64 = 24;

/// One cached venue record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VenueEntry {
    /// World display name.
    pub name: String,
    /// World thumbnail URL.
    #[serde(default)]
    pub thumbnail: Option<String>,
    /// When the entry was fetched.
    pub cached_at: DateTime<Utc>,
}

/// TTL-bounded venue cache, JSON round-trippable for persistence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VenueCache {
    entries: HashMap<String, VenueEntry>,
}

impl VenueCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a world, treating entries at or past the TTL as absent.
    #[must_use]
    pub fn get(&self, world_id: &str, now: DateTime<Utc>) -> Option<&VenueEntry> {
        let entry = self.entries.get(world_id)?;
        let age = now.signed_duration_since(entry.cached_at);
        (age < TimeDelta::hours(VENUE_CACHE_TTL_HOURS)).then_some(entry)
    }

    /// Whether a fresh entry exists for this world.
    #[must_use]
    pub fn contains_fresh(&self, world_id: &str, now: DateTime<Utc>) -> bool {
        self.get(world_id, now).is_some()
    }

    /// Write-through insert after a successful fetch.
    pub fn insert(
        &mut self,
        world_id: impl Into<String>,
        name: impl Into<String>,
        thumbnail: Option<String>,
        now: DateTime<Utc>,
    ) {
        self.entries.insert(
            world_id.into(),
            VenueEntry {
                name: name.into(),
                thumbnail,
                cached_at: now,
            },
        );
    }

    /// Drop entries at or past the TTL.
    pub fn prune(&mut self, now: DateTime<Utc>) {
        self.entries.retain(|_, entry| {
            now.signed_duration_since(entry.cached_at) < TimeDelta::hours(VENUE_CACHE_TTL_HOURS)
        });
    }

    /// Number of entries, stale included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(hours_ago: i64, now: DateTime<Utc>) -> DateTime<Utc> {
        now - TimeDelta::hours(hours_ago)
    }

    #[test]
    fn fresh_entries_are_returned() {
        let now = Utc::now();
        let mut cache = VenueCache::new();
        cache.insert("wrld_a", "The Garden", None, at(1, now));
        assert_eq!(
            cache.get("wrld_a", now).map(|e| e.name.as_str()),
            Some("The Garden")
        );
    }

    #[test]
    fn entry_exactly_at_ttl_is_expired() {
        let now = Utc::now();
        let mut cache = VenueCache::new();
        cache.insert("wrld_a", "The Garden", None, at(VENUE_CACHE_TTL_HOURS, now));
        assert!(cache.get("wrld_a", now).is_none());
    }

    #[test]
    fn entry_past_ttl_is_expired() {
        let now = Utc::now();
        let mut cache = VenueCache::new();
        cache.insert("wrld_a", "The Garden", None, at(VENUE_CACHE_TTL_HOURS + 5, now));
        assert!(cache.get("wrld_a", now).is_none());
    }

    #[test]
    fn prune_drops_stale_entries_only() {
        let now = Utc::now();
        let mut cache = VenueCache::new();
        cache.insert("wrld_fresh", "Fresh", None, at(1, now));
        cache.insert("wrld_stale", "Stale", None, at(48, now));

        cache.prune(now);
        assert_eq!(cache.len(), 1);
        assert!(cache.contains_fresh("wrld_fresh", now));
    }

    #[test]
    fn cache_round_trips_through_json() {
        let now = Utc::now();
        let mut cache = VenueCache::new();
        cache.insert(
            "wrld_a",
            "The Garden",
            Some("https://img.test/garden.png".to_string()),
            now,
        );

        let json = serde_json::to_string(&cache).unwrap();
        let restored: VenueCache = serde_json::from_str(&json).unwrap();
        assert_eq!(cache, restored);
    }
}
