//! Port Interfaces
//!
//! Contracts between the reconciler and the outside world, following the
//! same hexagonal split as the relay:
//!
//! ## Driven Ports (Outbound)
//!
//! - [`RelayTransport`]: the push channel from the relay server
//! - [`SnapshotApi`]: the HTTP snapshot endpoint
//! - [`WorldDirectory`]: venue metadata lookups
//! - [`StateStorage`]: durable local JSON storage
//!
//! All wire shapes here round-trip through JSON with camelCase keys.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

// =============================================================================
// Storage Keys
// =============================================================================

/// Durable key for the activity log.
pub const KEY_ACTIVITY_LOG: &str = "activity-log";

/// Durable key for the location-timestamp map.
pub const KEY_LOCATION_STAMPS: &str = "location-timestamps";

/// Durable key for the venue-metadata cache.
pub const KEY_VENUE_CACHE: &str = "venue-cache";

// =============================================================================
// Error Types
// =============================================================================

/// Errors surfaced by transports and fetch ports.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// The session credential was rejected; the user must log in again.
    #[error("session credential rejected")]
    Unauthorized,

    /// The connection failed or dropped.
    #[error("connection failed: {0}")]
    Connection(String),

    /// A payload could not be decoded.
    #[error("decode failed: {0}")]
    Decode(String),
}

// =============================================================================
// Push Events
// =============================================================================

/// Profile fields carried inside push event payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePayload {
    /// Opaque user id.
    pub id: String,
    /// Display name.
    pub display_name: String,
    /// Coarse presence status.
    #[serde(default)]
    pub status: Option<String>,
    /// Free-text status message.
    #[serde(default)]
    pub status_description: Option<String>,
    /// Icon URL.
    #[serde(default)]
    pub user_icon: Option<String>,
    /// Raw connectivity flag.
    #[serde(default)]
    pub platform: Option<String>,
    /// Location, when the payload carries one.
    #[serde(default)]
    pub location: Option<String>,
}

/// `friend-online` / `friend-active` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnlinePayload {
    /// Subject user id.
    pub user_id: String,
    /// Profile snapshot.
    pub user: ProfilePayload,
    /// Location the friend appeared in.
    #[serde(default)]
    pub location: Option<String>,
}

/// `friend-offline` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflinePayload {
    /// Subject user id.
    pub user_id: String,
}

/// `friend-location` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationPayload {
    /// Subject user id.
    pub user_id: String,
    /// New location string.
    pub location: String,
    /// Destination while traveling, when reported.
    #[serde(default)]
    pub traveling_to_location: Option<String>,
    /// Profile snapshot, when carried.
    #[serde(default)]
    pub user: Option<ProfilePayload>,
}

/// `friend-update` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePayload {
    /// Subject user id.
    pub user_id: String,
    /// Updated profile fields.
    pub user: ProfilePayload,
}

/// A decoded push event from the relay channel.
#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    /// Friend came online.
    Online(OnlinePayload),
    /// Friend went offline.
    Offline(OfflinePayload),
    /// Friend moved to another location.
    LocationChanged(LocationPayload),
    /// Friend profile fields changed.
    ProfileUpdated(UpdatePayload),
}

impl PushEvent {
    /// Decode a named channel message into an event.
    ///
    /// Returns `None` for event names that are not friend events; the
    /// caller drops those. Malformed payloads for known names are errors.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Decode`] when the payload does not parse
    /// for its event name.
    pub fn decode(event_name: &str, data: &str) -> Option<Result<Self, TransportError>> {
        let decoded = match event_name {
            "friend-online" | "friend-active" => {
                serde_json::from_str(data).map(Self::Online)
            }
            "friend-offline" => serde_json::from_str(data).map(Self::Offline),
            "friend-location" => serde_json::from_str(data).map(Self::LocationChanged),
            "friend-update" => serde_json::from_str(data).map(Self::ProfileUpdated),
            _ => return None,
        };
        Some(decoded.map_err(|e| TransportError::Decode(e.to_string())))
    }

    /// The subject user id.
    #[must_use]
    pub fn user_id(&self) -> &str {
        match self {
            Self::Online(p) => &p.user_id,
            Self::Offline(p) => &p.user_id,
            Self::LocationChanged(p) => &p.user_id,
            Self::ProfileUpdated(p) => &p.user_id,
        }
    }
}

/// One message from the relay channel.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayMessage {
    /// The relay's upstream connection is established.
    Connected,
    /// Heartbeat.
    Ping,
    /// A decoded friend event.
    Event(PushEvent),
    /// The relay's upstream connection closed; the channel is ending.
    Disconnected,
    /// The channel failed.
    Error(String),
}

// =============================================================================
// Snapshot Types
// =============================================================================

/// One contact in the snapshot response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotContact {
    /// Opaque user id.
    pub id: String,
    /// Display name.
    pub display_name: String,
    /// Coarse presence status.
    #[serde(default)]
    pub status: Option<String>,
    /// Free-text status message.
    #[serde(default)]
    pub status_description: Option<String>,
    /// Icon URL.
    #[serde(default)]
    pub user_icon: Option<String>,
    /// Raw connectivity flag.
    #[serde(default)]
    pub platform: Option<String>,
    /// Location string; `offline` for offline favorites.
    pub location: String,
    /// Whether the contact is favorited.
    #[serde(default)]
    pub is_favorite: bool,
    /// Ordinal favorite-group tag.
    #[serde(default)]
    pub favorite_group: Option<String>,
    /// Enriched world name.
    #[serde(default)]
    pub world_name: Option<String>,
    /// Enriched world thumbnail.
    #[serde(default)]
    pub world_thumbnail: Option<String>,
    /// Enriched live occupancy.
    #[serde(default)]
    pub occupant_count: Option<u32>,
}

/// The snapshot endpoint response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotPayload {
    /// Currently-online friends.
    #[serde(default)]
    pub friends: Vec<SnapshotContact>,
    /// Favorited friends that are not currently online.
    #[serde(default)]
    pub offline_friends: Vec<SnapshotContact>,
}

/// World metadata from the directory port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldMetadata {
    /// Display name.
    pub name: String,
    /// Thumbnail URL.
    #[serde(default)]
    pub thumbnail: Option<String>,
    /// Instance capacity.
    #[serde(default)]
    pub capacity: Option<u32>,
}

// =============================================================================
// Ports
// =============================================================================

/// Event stream delivered by a connected transport.
pub type EventStream = BoxStream<'static, RelayMessage>;

/// The push channel from the relay server.
#[async_trait]
pub trait RelayTransport: Send + Sync {
    /// Open the channel. The stream ends when the channel closes; the
    /// reconciler owns reconnection.
    async fn connect(&self) -> Result<EventStream, TransportError>;
}

/// The HTTP snapshot endpoint.
#[async_trait]
pub trait SnapshotApi: Send + Sync {
    /// Fetch the full snapshot.
    async fn fetch(&self) -> Result<SnapshotPayload, TransportError>;
}

/// Venue metadata lookups.
#[async_trait]
pub trait WorldDirectory: Send + Sync {
    /// Fetch metadata for one world.
    async fn world(&self, world_id: &str) -> Result<WorldMetadata, TransportError>;
}

/// Durable local JSON storage.
///
/// Everything persisted round-trips through [`serde_json::Value`], matching
/// a string-keyed browser storage area.
pub trait StateStorage: Send {
    /// Read a value.
    fn load(&self, key: &str) -> Option<serde_json::Value>;
    /// Write a value.
    fn store(&mut self, key: &str, value: &serde_json::Value);
    /// Delete a value.
    fn remove(&mut self, key: &str);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_routes_by_event_name() {
        let data = r#"{"userId":"usr_1","user":{"id":"usr_1","displayName":"willow"}}"#;
        assert!(matches!(
            PushEvent::decode("friend-online", data),
            Some(Ok(PushEvent::Online(_)))
        ));
        assert!(matches!(
            PushEvent::decode("friend-active", data),
            Some(Ok(PushEvent::Online(_)))
        ));
        assert!(matches!(
            PushEvent::decode("friend-offline", r#"{"userId":"usr_1"}"#),
            Some(Ok(PushEvent::Offline(_)))
        ));
        assert!(PushEvent::decode("ping", "123").is_none());
        assert!(matches!(
            PushEvent::decode("friend-online", "garbage"),
            Some(Err(TransportError::Decode(_)))
        ));
    }

    #[test]
    fn snapshot_payload_accepts_relay_shape() {
        let json = r#"{
            "friends": [{
                "id": "usr_1",
                "displayName": "willow",
                "status": "active",
                "location": "wrld_a:1~friends(usr_1)",
                "isFavorite": true,
                "favoriteGroup": "group_0",
                "worldName": "The Garden",
                "occupantCount": 5
            }],
            "offlineFriends": []
        }"#;
        let payload: SnapshotPayload = serde_json::from_str(json).unwrap();
        assert_eq!(payload.friends.len(), 1);
        assert!(payload.friends[0].is_favorite);
        assert_eq!(payload.friends[0].world_name.as_deref(), Some("The Garden"));
    }
}
