//! Friend Presence Event Types
//!
//! Canonical internal representation of the events the upstream pipeline
//! publishes about the user's friends. The adapter decodes raw pipeline
//! frames into these types; the relay forwards them to the browser channel
//! verbatim.
//!
//! # Event Kinds
//!
//! - `Online`: a friend came online (also emitted for `friend-active`)
//! - `Offline`: a friend went offline
//! - `LocationChanged`: a friend moved to a different world/instance
//! - `ProfileUpdated`: display name, status, or status message changed
//! - `Unknown`: an unrecognized pipeline type; dropped, never an error

use serde::{Deserialize, Serialize};

// =============================================================================
// Event Kind
// =============================================================================

/// Discriminator for the event kinds the relay understands.
///
/// The wire names are the upstream pipeline's `type` values; they are also
/// reused as the SSE event names on the browser channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Friend came online (`friend-online`, `friend-active`).
    Online,
    /// Friend went offline (`friend-offline`).
    Offline,
    /// Friend moved to another location (`friend-location`).
    LocationChanged,
    /// Friend profile fields changed (`friend-update`).
    ProfileUpdated,
}

impl EventKind {
    /// Classify an upstream pipeline `type` value.
    ///
    /// `friend-active` is treated identically to `friend-online`.
    /// Returns `None` for types the relay does not understand.
    #[must_use]
    pub fn from_pipeline_type(pipeline_type: &str) -> Option<Self> {
        match pipeline_type {
            "friend-online" | "friend-active" => Some(Self::Online),
            "friend-offline" => Some(Self::Offline),
            "friend-location" => Some(Self::LocationChanged),
            "friend-update" => Some(Self::ProfileUpdated),
            _ => None,
        }
    }

    /// The event name used on the browser push channel.
    #[must_use]
    pub const fn as_channel_name(self) -> &'static str {
        match self {
            Self::Online => "friend-online",
            Self::Offline => "friend-offline",
            Self::LocationChanged => "friend-location",
            Self::ProfileUpdated => "friend-update",
        }
    }
}

// =============================================================================
// Payload Types
// =============================================================================

/// Profile summary carried inside online/location/update payloads.
///
/// # Wire Format (JSON)
/// ```json
/// {
///   "id": "usr_5b9e...",
///   "displayName": "willow",
///   "status": "join me",
///   "statusDescription": "exploring",
///   "userIcon": "https://...",
///   "location": "wrld_abc:12345~friends(usr_5b9e...)"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    /// Opaque user id (`usr_*`).
    pub id: String,
    /// Display name.
    pub display_name: String,
    /// Coarse, user-settable presence status.
    #[serde(default)]
    pub status: Option<String>,
    /// Free-text status message.
    #[serde(default)]
    pub status_description: Option<String>,
    /// Icon URL.
    #[serde(default)]
    pub user_icon: Option<String>,
    /// Raw connectivity flag reported by the platform.
    #[serde(default)]
    pub platform: Option<String>,
    /// Current location, when the payload carries one.
    #[serde(default)]
    pub location: Option<String>,
}

/// Payload of an online (or active) event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendOnline {
    /// Subject user id.
    pub user_id: String,
    /// Profile snapshot at the time of the event.
    pub user: UserSummary,
    /// Location the friend appeared in, when known.
    #[serde(default)]
    pub location: Option<String>,
}

/// Payload of an offline event. The pipeline sends only the id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendOffline {
    /// Subject user id.
    pub user_id: String,
}

/// Payload of a location-change event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendLocation {
    /// Subject user id.
    pub user_id: String,
    /// New location string (or `traveling` while in transit).
    pub location: String,
    /// Destination while traveling, when the platform reports one.
    #[serde(default)]
    pub traveling_to_location: Option<String>,
    /// Profile snapshot, when the payload carries one.
    #[serde(default)]
    pub user: Option<UserSummary>,
}

/// Payload of a profile-update event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendUpdate {
    /// Subject user id.
    pub user_id: String,
    /// Updated profile fields.
    pub user: UserSummary,
}

// =============================================================================
// Classified Event
// =============================================================================

/// A fully decoded and classified friend event.
#[derive(Debug, Clone, PartialEq)]
pub enum FriendEvent {
    /// Friend came online.
    Online(FriendOnline),
    /// Friend went offline.
    Offline(FriendOffline),
    /// Friend moved to another location.
    LocationChanged(FriendLocation),
    /// Friend profile fields changed.
    ProfileUpdated(FriendUpdate),
}

impl FriendEvent {
    /// The kind of this event.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Online(_) => EventKind::Online,
            Self::Offline(_) => EventKind::Offline,
            Self::LocationChanged(_) => EventKind::LocationChanged,
            Self::ProfileUpdated(_) => EventKind::ProfileUpdated,
        }
    }

    /// The subject user id of this event.
    #[must_use]
    pub fn user_id(&self) -> &str {
        match self {
            Self::Online(p) => &p.user_id,
            Self::Offline(p) => &p.user_id,
            Self::LocationChanged(p) => &p.user_id,
            Self::ProfileUpdated(p) => &p.user_id,
        }
    }

    /// Serialize the inner payload back to JSON for the browser channel.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be serialized, which does not
    /// happen for payloads produced by the codec.
    pub fn payload_json(&self) -> Result<String, serde_json::Error> {
        match self {
            Self::Online(p) => serde_json::to_string(p),
            Self::Offline(p) => serde_json::to_string(p),
            Self::LocationChanged(p) => serde_json::to_string(p),
            Self::ProfileUpdated(p) => serde_json::to_string(p),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_known_pipeline_types() {
        assert_eq!(
            EventKind::from_pipeline_type("friend-online"),
            Some(EventKind::Online)
        );
        assert_eq!(
            EventKind::from_pipeline_type("friend-active"),
            Some(EventKind::Online)
        );
        assert_eq!(
            EventKind::from_pipeline_type("friend-offline"),
            Some(EventKind::Offline)
        );
        assert_eq!(
            EventKind::from_pipeline_type("friend-location"),
            Some(EventKind::LocationChanged)
        );
        assert_eq!(
            EventKind::from_pipeline_type("friend-update"),
            Some(EventKind::ProfileUpdated)
        );
    }

    #[test]
    fn unknown_pipeline_types_are_none() {
        assert_eq!(EventKind::from_pipeline_type("notification"), None);
        assert_eq!(EventKind::from_pipeline_type("friend-add"), None);
        assert_eq!(EventKind::from_pipeline_type(""), None);
    }

    #[test]
    fn channel_names_round_trip() {
        for kind in [
            EventKind::Online,
            EventKind::Offline,
            EventKind::LocationChanged,
            EventKind::ProfileUpdated,
        ] {
            assert_eq!(
                EventKind::from_pipeline_type(kind.as_channel_name()),
                Some(kind)
            );
        }
    }

    #[test]
    fn event_exposes_subject_id() {
        let event = FriendEvent::Offline(FriendOffline {
            user_id: "usr_1".to_string(),
        });
        assert_eq!(event.user_id(), "usr_1");
        assert_eq!(event.kind(), EventKind::Offline);
    }

    #[test]
    fn payload_json_is_camel_case() {
        let event = FriendEvent::LocationChanged(FriendLocation {
            user_id: "usr_1".to_string(),
            location: "wrld_a:1".to_string(),
            traveling_to_location: None,
            user: None,
        });
        let json = event.payload_json().unwrap();
        assert!(json.contains("\"userId\""));
        assert!(json.contains("\"location\""));
    }
}
