//! View State
//!
//! The grouped, sorted output the presentation layer renders. The whole
//! view is rebuilt from the contact store on every state change - the
//! grouping and ordering are cheap to rebuild and hard to patch correctly,
//! so recomputation, not mutation, is the consistency mechanism. Building
//! is a pure function of store state: two builds without an intervening
//! mutation yield identical output.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::contact::{Contact, group_ordinal};
use crate::domain::location::{AccessTier, ParsedLocation, Region, parse};

use super::store::ContactStore;

// =============================================================================
// Connection Status
// =============================================================================

/// Tri-state connectivity indicator for the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    /// Push channel established.
    Connected,
    /// Connecting or waiting out the reconnect backoff.
    Reconnecting,
    /// No channel and no reconnect pending.
    #[default]
    Disconnected,
}

// =============================================================================
// Instance View
// =============================================================================

/// One rendered instance: every contact sharing a location.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceView {
    /// Grouping key: the shared location string (or a pseudo sentinel).
    pub key: String,
    /// World id, absent for pseudo-instances.
    pub world_id: Option<String>,
    /// Resolved world name; the UI falls back to the raw key when absent.
    pub world_name: Option<String>,
    /// Resolved world thumbnail.
    pub world_thumbnail: Option<String>,
    /// Access tier.
    pub access_tier: AccessTier,
    /// Hosting region.
    pub region: Region,
    /// Instance owner, when encoded in the location.
    pub owner_id: Option<String>,
    /// Owning group, when encoded in the location.
    pub group_id: Option<String>,
    /// Favorited occupants, owner first, then longest-resident first.
    pub favorites: Vec<Contact>,
    /// Non-favorited occupants, same ordering.
    pub other_friends: Vec<Contact>,
    /// Live occupancy, best-effort.
    pub occupant_count: Option<u32>,
}

impl InstanceView {
    /// Whether this is a traveling/private pseudo-instance.
    #[must_use]
    pub const fn is_pseudo(&self) -> bool {
        matches!(
            self.access_tier,
            AccessTier::Private | AccessTier::Traveling
        ) && self.world_id.is_none()
    }

    fn earliest_favorite_joined_at(&self) -> Option<DateTime<Utc>> {
        self.favorites.iter().map(|c| c.joined_at).min()
    }

    fn min_group_ordinal(&self) -> u32 {
        self.favorites
            .iter()
            .filter_map(Contact::group_ordinal)
            .min()
            .unwrap_or(u32::MAX)
    }
}

// =============================================================================
// View State
// =============================================================================

/// Everything the presentation layer renders.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewState {
    /// Connectivity indicator.
    pub connection: ConnectionStatus,
    /// Instances with at least one favorited occupant, in display order.
    pub instances: Vec<InstanceView>,
    /// Favorited friends that are not currently online.
    pub offline_favorites: Vec<Contact>,
}

// =============================================================================
// Building
// =============================================================================

/// Rebuild the instance list from the store.
///
/// Only instances holding at least one favorited contact survive; the rest
/// of the grouping is discarded.
#[must_use]
pub fn build_instances(store: &ContactStore) -> Vec<InstanceView> {
    let mut by_location: Vec<(String, Vec<&Contact>)> = Vec::new();

    for contact in store.contacts().values() {
        if contact.location == "offline" {
            continue;
        }
        match by_location
            .iter_mut()
            .find(|(key, _)| *key == contact.location)
        {
            Some((_, members)) => members.push(contact),
            None => by_location.push((contact.location.clone(), vec![contact])),
        }
    }

    let mut instances: Vec<InstanceView> = by_location
        .into_iter()
        .map(|(key, members)| build_instance(key, &members))
        .filter(|instance| !instance.favorites.is_empty())
        .collect();

    instances.sort_by(|a, b| {
        // Traveling/private pseudo-groups pin after all concrete venues.
        a.is_pseudo()
            .cmp(&b.is_pseudo())
            // The venue favorites have been in longest surfaces first.
            .then_with(|| {
                a.earliest_favorite_joined_at()
                    .cmp(&b.earliest_favorite_joined_at())
            })
            .then_with(|| a.min_group_ordinal().cmp(&b.min_group_ordinal()))
            .then_with(|| b.favorites.len().cmp(&a.favorites.len()))
            .then_with(|| a.key.cmp(&b.key))
    });

    instances
}

/// Rebuild the full view state for publication.
#[must_use]
pub fn build_view(store: &ContactStore, connection: ConnectionStatus) -> ViewState {
    ViewState {
        connection,
        instances: build_instances(store),
        offline_favorites: store.offline_favorites().to_vec(),
    }
}

fn build_instance(key: String, members: &[&Contact]) -> InstanceView {
    let parsed: ParsedLocation = parse(&key);

    let mut favorites: Vec<Contact> = Vec::new();
    let mut other_friends: Vec<Contact> = Vec::new();
    for contact in members {
        if contact.is_favorite {
            favorites.push((*contact).clone());
        } else {
            other_friends.push((*contact).clone());
        }
    }

    sort_members(&mut favorites, parsed.owner_id.as_deref());
    sort_members(&mut other_friends, parsed.owner_id.as_deref());

    let world_name = members.iter().find_map(|c| c.world_name.clone());
    let world_thumbnail = members.iter().find_map(|c| c.world_thumbnail.clone());
    let occupant_count = members.iter().filter_map(|c| c.occupant_count).max();

    InstanceView {
        key,
        world_id: parsed.world_id,
        world_name,
        world_thumbnail,
        access_tier: parsed.access_tier,
        region: parsed.region,
        owner_id: parsed.owner_id,
        group_id: parsed.group_id,
        favorites,
        other_friends,
        occupant_count,
    }
}

/// Owner first, then ascending `joined_at` (longest-resident first), with
/// the id as a deterministic final tie-break.
fn sort_members(members: &mut [Contact], owner_id: Option<&str>) {
    members.sort_by(|a, b| {
        let a_owner = owner_id == Some(a.id.as_str());
        let b_owner = owner_id == Some(b.id.as_str());
        b_owner
            .cmp(&a_owner)
            .then_with(|| a.joined_at.cmp(&b.joined_at))
            .then_with(|| a.id.cmp(&b.id))
    });
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;

    use crate::application::ports::{SnapshotContact, SnapshotPayload};
    use crate::domain::contact::Status;

    use super::*;

    fn record(
        id: &str,
        location: &str,
        favorite: bool,
        group: Option<&str>,
    ) -> SnapshotContact {
        SnapshotContact {
            id: id.to_string(),
            display_name: format!("name-{id}"),
            status: Some("active".to_string()),
            status_description: None,
            user_icon: None,
            platform: None,
            location: location.to_string(),
            is_favorite: favorite,
            favorite_group: group.map(ToString::to_string),
            world_name: None,
            world_thumbnail: None,
            occupant_count: None,
        }
    }

    fn store_from(records: Vec<SnapshotContact>) -> ContactStore {
        let mut store = ContactStore::new();
        let payload = SnapshotPayload {
            friends: records,
            offline_friends: vec![],
        };
        store.apply_snapshot(&payload, store.seq(), Utc::now());
        store
    }

    #[test]
    fn instances_require_a_favorited_occupant() {
        let store = store_from(vec![
            record("usr_1", "wrld_a:1", true, Some("group_0")),
            record("usr_2", "wrld_b:2", false, None),
        ]);

        let instances = build_instances(&store);
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].key, "wrld_a:1");
    }

    #[test]
    fn non_favorites_partition_into_other_friends() {
        let store = store_from(vec![
            record("usr_1", "wrld_a:1~friends(usr_1)", true, Some("group_0")),
            record("usr_2", "wrld_a:1~friends(usr_1)", false, None),
        ]);

        let instances = build_instances(&store);
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].favorites.len(), 1);
        assert_eq!(instances[0].other_friends.len(), 1);
        assert_eq!(instances[0].favorites[0].id, "usr_1");
        assert_eq!(instances[0].other_friends[0].id, "usr_2");
    }

    #[test]
    fn owner_sorts_first_then_longest_resident() {
        let now = Utc::now();
        let mut store = ContactStore::new();
        let payload = SnapshotPayload {
            friends: vec![
                record("usr_a", "wrld_w:1~friends(usr_owner)", true, Some("group_0")),
                record("usr_owner", "wrld_w:1~friends(usr_owner)", true, Some("group_0")),
                record("usr_b", "wrld_w:1~friends(usr_owner)", true, Some("group_0")),
            ],
            offline_friends: vec![],
        };
        store.apply_snapshot(&payload, store.seq(), now);

        let instances = build_instances(&store);
        let ids: Vec<&str> = instances[0]
            .favorites
            .iter()
            .map(|c| c.id.as_str())
            .collect();
        assert_eq!(ids[0], "usr_owner");
    }

    #[test]
    fn pseudo_instances_pin_after_concrete_venues() {
        let store = store_from(vec![
            record("usr_1", "private", true, Some("group_0")),
            record("usr_2", "wrld_a:1", true, Some("group_0")),
            record("usr_3", "traveling", true, Some("group_0")),
        ]);

        let instances = build_instances(&store);
        assert_eq!(instances.len(), 3);
        assert_eq!(instances[0].key, "wrld_a:1");
        assert!(instances[1].is_pseudo());
        assert!(instances[2].is_pseudo());
    }

    #[test]
    fn concrete_venues_order_by_earliest_favorite_arrival() {
        let now = Utc::now();
        let mut store = ContactStore::new();

        // usr_1 arrives in wrld_a first; usr_2 arrives in wrld_b later.
        let payload = SnapshotPayload {
            friends: vec![record("usr_1", "wrld_a:1", true, Some("group_0"))],
            offline_friends: vec![],
        };
        store.apply_snapshot(&payload, store.seq(), now - TimeDelta::minutes(30));

        let payload = SnapshotPayload {
            friends: vec![
                record("usr_1", "wrld_a:1", true, Some("group_0")),
                record("usr_2", "wrld_b:2", true, Some("group_0")),
            ],
            offline_friends: vec![],
        };
        store.apply_snapshot(&payload, store.seq(), now);

        let instances = build_instances(&store);
        assert_eq!(instances[0].key, "wrld_a:1");
        assert_eq!(instances[1].key, "wrld_b:2");
    }

    #[test]
    fn ties_break_by_group_ordinal_then_favorite_count() {
        let now = Utc::now();
        let mut store = ContactStore::new();
        let payload = SnapshotPayload {
            friends: vec![
                record("usr_1", "wrld_a:1", true, Some("group_2")),
                record("usr_2", "wrld_b:2", true, Some("group_0")),
                record("usr_3", "wrld_b:2", true, Some("group_0")),
            ],
            offline_friends: vec![],
        };
        store.apply_snapshot(&payload, store.seq(), now);

        let instances = build_instances(&store);
        // Same earliest arrival; group_0 beats group_2.
        assert_eq!(instances[0].key, "wrld_b:2");
        assert_eq!(instances[1].key, "wrld_a:1");
    }

    #[test]
    fn rebuild_is_idempotent() {
        let store = store_from(vec![
            record("usr_1", "wrld_a:1~friends(usr_1)", true, Some("group_0")),
            record("usr_2", "wrld_a:1~friends(usr_1)", false, None),
            record("usr_3", "private", true, Some("group_1")),
        ]);

        let first = build_instances(&store);
        let second = build_instances(&store);
        assert_eq!(first, second);
    }

    #[test]
    fn view_carries_connection_and_offline_favorites() {
        let mut store = ContactStore::new();
        let payload = SnapshotPayload {
            friends: vec![],
            offline_friends: vec![record("usr_9", "offline", true, Some("group_0"))],
        };
        store.apply_snapshot(&payload, store.seq(), Utc::now());

        let view = build_view(&store, ConnectionStatus::Connected);
        assert_eq!(view.connection, ConnectionStatus::Connected);
        assert!(view.instances.is_empty());
        assert_eq!(view.offline_favorites.len(), 1);
        assert_eq!(view.offline_favorites[0].status, Status::Offline);
    }
}
