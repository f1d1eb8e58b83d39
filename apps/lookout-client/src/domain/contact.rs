//! Contact Types
//!
//! The authoritative per-friend record the reconciler maintains, plus the
//! coarse presence status vocabulary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Status
// =============================================================================

/// Coarse, user-settable presence status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Status {
    /// Online and open.
    #[serde(rename = "active")]
    Active,
    /// Online, inviting friends along.
    #[serde(rename = "join me")]
    JoinMe,
    /// Online, ask before joining.
    #[serde(rename = "ask me")]
    AskMe,
    /// Online, do not disturb.
    #[serde(rename = "busy")]
    Busy,
    /// Offline.
    #[default]
    #[serde(rename = "offline")]
    Offline,
}

impl Status {
    /// Parse a wire status value. Unknown values map to [`Status::Active`]
    /// so an online friend with a novel status still renders as online.
    #[must_use]
    pub fn from_wire(value: &str) -> Self {
        match value {
            "join me" => Self::JoinMe,
            "ask me" => Self::AskMe,
            "busy" => Self::Busy,
            "offline" => Self::Offline,
            _ => Self::Active,
        }
    }

    /// The wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::JoinMe => "join me",
            Self::AskMe => "ask me",
            Self::Busy => "busy",
            Self::Offline => "offline",
        }
    }
}

// =============================================================================
// Contact
// =============================================================================

/// One friend in the live view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    /// Opaque user id (`usr_*`).
    pub id: String,
    /// Display name.
    pub display_name: String,
    /// Coarse presence status.
    pub status: Status,
    /// Free-text status message.
    #[serde(default)]
    pub status_description: String,
    /// Icon URL.
    #[serde(default)]
    pub user_icon: Option<String>,
    /// Raw connectivity flag reported by the platform.
    #[serde(default)]
    pub platform: Option<String>,
    /// Current location string, or a sentinel value.
    pub location: String,
    /// Whether the contact is favorited.
    #[serde(default)]
    pub is_favorite: bool,
    /// Ordinal favorite-group tag, e.g. `group_0`.
    #[serde(default)]
    pub favorite_group: Option<String>,
    /// Client-observed timestamp of the last location change. Inferred
    /// locally, never provided upstream; best-effort display data only.
    pub joined_at: DateTime<Utc>,
    /// Resolved world name, when known.
    #[serde(default)]
    pub world_name: Option<String>,
    /// Resolved world thumbnail, when known.
    #[serde(default)]
    pub world_thumbnail: Option<String>,
    /// Live occupancy of the contact's instance, best-effort.
    #[serde(default)]
    pub occupant_count: Option<u32>,
}

impl Contact {
    /// Ordinal of the favorite group (`group_2` → 2); `None` when the
    /// contact is unfavorited or the tag is malformed.
    #[must_use]
    pub fn group_ordinal(&self) -> Option<u32> {
        group_ordinal(self.favorite_group.as_deref()?)
    }
}

/// Parse the ordinal out of a `group_<n>` tag.
#[must_use]
pub fn group_ordinal(tag: &str) -> Option<u32> {
    tag.strip_prefix("group_")?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_wire_round_trip() {
        for status in [
            Status::Active,
            Status::JoinMe,
            Status::AskMe,
            Status::Busy,
            Status::Offline,
        ] {
            assert_eq!(Status::from_wire(status.as_str()), status);
        }
    }

    #[test]
    fn unknown_status_counts_as_active() {
        assert_eq!(Status::from_wire("sleeping"), Status::Active);
    }

    #[test]
    fn status_serde_uses_wire_names() {
        assert_eq!(
            serde_json::to_string(&Status::JoinMe).unwrap(),
            "\"join me\""
        );
        let status: Status = serde_json::from_str("\"ask me\"").unwrap();
        assert_eq!(status, Status::AskMe);
    }

    #[test]
    fn group_ordinals() {
        assert_eq!(group_ordinal("group_0"), Some(0));
        assert_eq!(group_ordinal("group_12"), Some(12));
        assert_eq!(group_ordinal("group_"), None);
        assert_eq!(group_ordinal("other"), None);
    }
}
