//! Contact Store
//!
//! The explicit owned state behind the reconciler: the authoritative
//! contact map, the favorite set, the location-timestamp map, the venue
//! cache, and the offline-favorites list. Single writer - only the
//! reconciler mutates it, so there is no locking here.
//!
//! Every push mutation bumps a store-global sequence and records it
//! against the subject contact. A snapshot refresh captures the sequence
//! when it was issued and later skips any contact pushed past that mark,
//! so push events always win over a concurrently-arriving refresh.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::activity::LogKind;
use crate::domain::contact::{Contact, Status};
use crate::domain::location::world_id_of;
use crate::domain::venue::VenueCache;

use super::ports::{
    LocationPayload, OfflinePayload, OnlinePayload, ProfilePayload, SnapshotContact,
    SnapshotPayload, UpdatePayload, WorldMetadata,
};

// =============================================================================
// Persisted Records
// =============================================================================

/// Per-contact location stamp: the last-seen location and when it was
/// first observed. Only used to compute "time in current location".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationStamp {
    /// Last-seen location string.
    pub location: String,
    /// When that location was first observed.
    pub joined_at: DateTime<Utc>,
}

// =============================================================================
// Apply Effects
// =============================================================================

/// A log entry requested by a state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRequest {
    /// Entry type.
    pub kind: LogKind,
    /// Subject display name.
    pub subject: String,
    /// Detail string.
    pub detail: String,
}

/// What the caller must do after applying a mutation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplyEffects {
    /// Activity log entries to append.
    pub log: Vec<LogRequest>,
    /// World ids needing an async metadata fetch.
    pub fetch_worlds: Vec<String>,
    /// Whether view state may have changed.
    pub changed: bool,
}

// =============================================================================
// Contact Store
// =============================================================================

/// Authoritative per-session view state.
#[derive(Debug, Default)]
pub struct ContactStore {
    contacts: HashMap<String, Contact>,
    update_seqs: HashMap<String, u64>,
    favorites: HashMap<String, Option<String>>,
    offline_favorites: Vec<Contact>,
    stamps: HashMap<String, LocationStamp>,
    venues: VenueCache,
    seq: u64,
}

impl ContactStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore persisted side-state loaded from durable storage.
    pub fn restore(&mut self, stamps: HashMap<String, LocationStamp>, venues: VenueCache) {
        self.stamps = stamps;
        self.venues = venues;
    }

    /// Store-global push sequence; bumped on every push mutation.
    #[must_use]
    pub const fn seq(&self) -> u64 {
        self.seq
    }

    /// The live contact map.
    #[must_use]
    pub const fn contacts(&self) -> &HashMap<String, Contact> {
        &self.contacts
    }

    /// One live contact.
    #[must_use]
    pub fn contact(&self, id: &str) -> Option<&Contact> {
        self.contacts.get(id)
    }

    /// Favorited friends that are not currently online.
    #[must_use]
    pub fn offline_favorites(&self) -> &[Contact] {
        &self.offline_favorites
    }

    /// The location-timestamp map, for persistence.
    #[must_use]
    pub const fn stamps(&self) -> &HashMap<String, LocationStamp> {
        &self.stamps
    }

    /// The venue cache, for persistence.
    #[must_use]
    pub const fn venues(&self) -> &VenueCache {
        &self.venues
    }

    /// Whether a contact is favorited.
    #[must_use]
    pub fn is_favorite(&self, user_id: &str) -> bool {
        self.favorites.contains_key(user_id)
    }

    // =========================================================================
    // Push Event Application
    // =========================================================================

    /// Apply an online (or active) event: insert/replace the contact.
    pub fn apply_online(&mut self, payload: &OnlinePayload, now: DateTime<Utc>) -> ApplyEffects {
        let mut effects = ApplyEffects {
            changed: true,
            ..ApplyEffects::default()
        };

        let location = payload
            .location
            .clone()
            .or_else(|| payload.user.location.clone())
            .unwrap_or_else(|| "private".to_string());

        let contact = self.build_contact(&payload.user_id, &payload.user, &location, now);
        if self.is_favorite(&payload.user_id) {
            effects.log.push(LogRequest {
                kind: LogKind::Online,
                subject: contact.display_name.clone(),
                detail: "came online".to_string(),
            });
        }
        if let Some(world_id) = self.unresolved_world(&location, now) {
            effects.fetch_worlds.push(world_id);
        }

        self.contacts.insert(payload.user_id.clone(), contact);
        self.bump(&payload.user_id);
        effects
    }

    /// Apply an offline event: drop the contact and its location stamp.
    pub fn apply_offline(&mut self, payload: &OfflinePayload, _now: DateTime<Utc>) -> ApplyEffects {
        let mut effects = ApplyEffects::default();

        let Some(removed) = self.contacts.remove(&payload.user_id) else {
            // Unknown contact; still bump so a stale refresh cannot revive it.
            self.bump(&payload.user_id);
            return effects;
        };
        self.stamps.remove(&payload.user_id);
        self.bump(&payload.user_id);

        if self.is_favorite(&payload.user_id) {
            effects.log.push(LogRequest {
                kind: LogKind::Offline,
                subject: removed.display_name,
                detail: "went offline".to_string(),
            });
        }
        effects.changed = true;
        effects
    }

    /// Apply a location change, merging onto the existing record.
    pub fn apply_location(
        &mut self,
        payload: &LocationPayload,
        now: DateTime<Utc>,
    ) -> ApplyEffects {
        let mut effects = ApplyEffects::default();

        let previous = self.contacts.get(&payload.user_id).cloned();
        let (mut contact, old_location, old_display) = match (&previous, &payload.user) {
            (Some(existing), _) => (
                existing.clone(),
                Some(existing.location.clone()),
                Some(
                    existing
                        .world_name
                        .clone()
                        .unwrap_or_else(|| existing.location.clone()),
                ),
            ),
            (None, Some(profile)) => (
                self.build_contact(&payload.user_id, profile, &payload.location, now),
                None,
                None,
            ),
            // Nothing to merge onto and no profile to create from.
            (None, None) => return effects,
        };

        contact.location = payload.location.clone();
        if let Some(profile) = &payload.user {
            merge_profile(&mut contact, profile);
        }
        contact.joined_at = self.touch_stamp(&payload.user_id, &payload.location, now);
        let (world_name, world_thumbnail) = self.venue_display(&payload.location, now);
        contact.world_name = world_name;
        contact.world_thumbnail = world_thumbnail;
        contact.occupant_count = None;

        let moved = old_location.as_deref() != Some(payload.location.as_str());
        if moved && self.is_favorite(&payload.user_id) {
            let to = contact
                .world_name
                .clone()
                .unwrap_or_else(|| payload.location.clone());
            let detail = old_display.map_or_else(|| to.clone(), |from| format!("{from} → {to}"));
            effects.log.push(LogRequest {
                kind: LogKind::LocationChange,
                subject: contact.display_name.clone(),
                detail,
            });
        }
        if let Some(world_id) = self.unresolved_world(&payload.location, now) {
            effects.fetch_worlds.push(world_id);
        }

        self.contacts.insert(payload.user_id.clone(), contact);
        self.bump(&payload.user_id);
        effects.changed = true;
        effects
    }

    /// Apply a profile update; no-op for untracked contacts.
    pub fn apply_profile(&mut self, payload: &UpdatePayload, _now: DateTime<Utc>) -> ApplyEffects {
        let mut effects = ApplyEffects::default();

        let favorited = self.is_favorite(&payload.user_id);
        let Some(contact) = self.contacts.get_mut(&payload.user_id) else {
            return effects;
        };

        let old_status = contact.status;
        let old_message = contact.status_description.clone();

        merge_profile(contact, &payload.user);

        if favorited && contact.status != old_status {
            effects.log.push(LogRequest {
                kind: LogKind::StatusChange,
                subject: contact.display_name.clone(),
                detail: format!("{} → {}", old_status.as_str(), contact.status.as_str()),
            });
        }
        if favorited && contact.status_description != old_message {
            effects.log.push(LogRequest {
                kind: LogKind::StatusMessageChange,
                subject: contact.display_name.clone(),
                detail: format!("{old_message} → {}", contact.status_description),
            });
        }

        self.bump(&payload.user_id);
        effects.changed = true;
        effects
    }

    // =========================================================================
    // Async Patches
    // =========================================================================

    /// Apply a resolved world lookup: write the cache through and patch
    /// every contact still in that world. A resolution that raced a later
    /// location change only updates the cache - the freshness check is
    /// that the contact's current location still references the world.
    pub fn apply_world(
        &mut self,
        world_id: &str,
        metadata: &WorldMetadata,
        now: DateTime<Utc>,
    ) -> bool {
        self.venues
            .insert(world_id, &*metadata.name, metadata.thumbnail.clone(), now);

        let mut changed = false;
        for contact in self.contacts.values_mut() {
            if world_id_of(&contact.location) == Some(world_id) {
                contact.world_name = Some(metadata.name.clone());
                contact.world_thumbnail = metadata.thumbnail.clone();
                changed = true;
            }
        }
        changed
    }

    // =========================================================================
    // Snapshot Application
    // =========================================================================

    /// Merge a snapshot (initial or refresh) into the store.
    ///
    /// `start_seq` is the store sequence captured when the snapshot request
    /// was issued: contacts pushed past it - including ones pushed offline -
    /// are left alone, so the refresh never regresses push-delivered state.
    pub fn apply_snapshot(
        &mut self,
        payload: &SnapshotPayload,
        start_seq: u64,
        now: DateTime<Utc>,
    ) -> ApplyEffects {
        let mut effects = ApplyEffects {
            changed: true,
            ..ApplyEffects::default()
        };

        // The snapshot is the authority on the favorite set.
        self.favorites = payload
            .friends
            .iter()
            .filter(|c| c.is_favorite)
            .chain(payload.offline_friends.iter())
            .map(|c| (c.id.clone(), c.favorite_group.clone()))
            .collect();

        let snapshot_ids: HashSet<&str> = payload.friends.iter().map(|c| c.id.as_str()).collect();

        for record in &payload.friends {
            if self.pushed_since(&record.id, start_seq) {
                continue;
            }
            // Backfill the venue cache from the snapshot's own enrichment.
            if let (Some(world_id), Some(name)) =
                (world_id_of(&record.location), record.world_name.as_deref())
                && !self.venues.contains_fresh(world_id, now)
            {
                let world_id = world_id.to_string();
                self.venues
                    .insert(world_id, name, record.world_thumbnail.clone(), now);
            }

            let contact = self.contact_from_snapshot(record, now);
            if let Some(world_id) = self.unresolved_world(&record.location, now) {
                effects.fetch_worlds.push(world_id);
            }
            self.contacts.insert(record.id.clone(), contact);
        }

        // Contacts the snapshot no longer lists went offline while we were
        // not looking - unless a newer push event already spoke for them.
        let stale: Vec<String> = self
            .contacts
            .keys()
            .filter(|id| !snapshot_ids.contains(id.as_str()) && !self.pushed_since(id, start_seq))
            .cloned()
            .collect();
        for id in &stale {
            self.contacts.remove(id);
            self.stamps.remove(id);
        }

        // Favorite flags follow the refreshed favorite set even for
        // contacts whose presence the refresh must not touch.
        for (id, contact) in &mut self.contacts {
            contact.is_favorite = self.favorites.contains_key(id);
            contact.favorite_group = self.favorites.get(id).cloned().flatten();
        }

        let offline_records: Vec<&SnapshotContact> = payload
            .offline_friends
            .iter()
            .filter(|record| !self.contacts.contains_key(&record.id))
            .collect();
        self.offline_favorites = offline_records
            .into_iter()
            .map(|record| {
                let mut contact = self.contact_from_snapshot(record, now);
                contact.status = Status::Offline;
                contact.is_favorite = true;
                contact
            })
            .collect();

        self.stamps
            .retain(|id, _| self.contacts.contains_key(id));
        self.update_seqs
            .retain(|id, seq| self.contacts.contains_key(id) || *seq > start_seq);
        self.venues.prune(now);

        effects
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn bump(&mut self, user_id: &str) {
        self.seq += 1;
        self.update_seqs.insert(user_id.to_string(), self.seq);
    }

    fn pushed_since(&self, user_id: &str, start_seq: u64) -> bool {
        self.update_seqs
            .get(user_id)
            .is_some_and(|seq| *seq > start_seq)
    }

    /// Ensure a stamp exists for this location, preserving the original
    /// timestamp while the location is unchanged.
    fn touch_stamp(&mut self, user_id: &str, location: &str, now: DateTime<Utc>) -> DateTime<Utc> {
        match self.stamps.get(user_id) {
            Some(stamp) if stamp.location == location => stamp.joined_at,
            _ => {
                self.stamps.insert(
                    user_id.to_string(),
                    LocationStamp {
                        location: location.to_string(),
                        joined_at: now,
                    },
                );
                now
            }
        }
    }

    fn venue_display(
        &self,
        location: &str,
        now: DateTime<Utc>,
    ) -> (Option<String>, Option<String>) {
        world_id_of(location)
            .and_then(|world_id| self.venues.get(world_id, now))
            .map_or((None, None), |entry| {
                (Some(entry.name.clone()), entry.thumbnail.clone())
            })
    }

    fn unresolved_world(&self, location: &str, now: DateTime<Utc>) -> Option<String> {
        world_id_of(location)
            .filter(|world_id| !self.venues.contains_fresh(world_id, now))
            .map(ToString::to_string)
    }

    fn build_contact(
        &mut self,
        user_id: &str,
        profile: &ProfilePayload,
        location: &str,
        now: DateTime<Utc>,
    ) -> Contact {
        let joined_at = self.touch_stamp(user_id, location, now);
        let (world_name, world_thumbnail) = self.venue_display(location, now);
        let group = self.favorites.get(user_id).cloned();

        Contact {
            id: user_id.to_string(),
            display_name: profile.display_name.clone(),
            status: profile
                .status
                .as_deref()
                .map_or(Status::Active, Status::from_wire),
            status_description: profile.status_description.clone().unwrap_or_default(),
            user_icon: profile.user_icon.clone(),
            platform: profile.platform.clone(),
            location: location.to_string(),
            is_favorite: group.is_some(),
            favorite_group: group.flatten(),
            joined_at,
            world_name,
            world_thumbnail,
            occupant_count: None,
        }
    }

    fn contact_from_snapshot(&mut self, record: &SnapshotContact, now: DateTime<Utc>) -> Contact {
        let joined_at = self.touch_stamp(&record.id, &record.location, now);
        let (cached_name, cached_thumbnail) = self.venue_display(&record.location, now);

        Contact {
            id: record.id.clone(),
            display_name: record.display_name.clone(),
            status: record
                .status
                .as_deref()
                .map_or(Status::Active, Status::from_wire),
            status_description: record.status_description.clone().unwrap_or_default(),
            user_icon: record.user_icon.clone(),
            platform: record.platform.clone(),
            location: record.location.clone(),
            is_favorite: record.is_favorite,
            favorite_group: record.favorite_group.clone(),
            joined_at,
            world_name: record.world_name.clone().or(cached_name),
            world_thumbnail: record.world_thumbnail.clone().or(cached_thumbnail),
            occupant_count: record.occupant_count,
        }
    }
}

/// Patch the fields a profile payload carries onto a contact.
fn merge_profile(contact: &mut Contact, profile: &ProfilePayload) {
    contact.display_name.clone_from(&profile.display_name);
    if let Some(status) = profile.status.as_deref() {
        contact.status = Status::from_wire(status);
    }
    if let Some(message) = &profile.status_description {
        contact.status_description.clone_from(message);
    }
    if profile.user_icon.is_some() {
        contact.user_icon.clone_from(&profile.user_icon);
    }
    if profile.platform.is_some() {
        contact.platform.clone_from(&profile.platform);
    }
}
