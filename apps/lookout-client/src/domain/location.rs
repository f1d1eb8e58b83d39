//! Location String Decoding
//!
//! Decodes the platform's compact location encoding into typed attributes.
//!
//! # Encoding
//!
//! ```text
//! <worldId>:<instanceShortId>[~tag(...)]*
//! ```
//!
//! with sentinel whole-string values `offline`, `private`, and `traveling`.
//! Examples:
//!
//! ```text
//! wrld_abc:12345~friends(usr_9)~region(eu)
//! wrld_abc:12345~group(grp_7)~groupAccessType(public)~region(jp)
//! wrld_abc:99999~private(usr_9)~canRequestInvite~region(use)
//! ```
//!
//! Decoding is total: malformed suffixes simply fail to set owner, group,
//! or region and the tier falls back to [`AccessTier::Public`]. The parser
//! never panics on any input.

use std::sync::OnceLock;

use regex::Regex;

// =============================================================================
// Access Tier
// =============================================================================

/// Visibility/join policy of an instance. Closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum AccessTier {
    /// Anyone can join.
    Public,
    /// Friends of the instance owner.
    Friends,
    /// Friends-of-friends ("hidden" in the wire encoding).
    FriendsPlus,
    /// Invite only.
    Invite,
    /// Invite only, requests allowed.
    InvitePlus,
    /// Group members.
    Group,
    /// Open to everyone through the owning group.
    GroupPublic,
    /// Group members and their friends.
    GroupPlus,
    /// Not joinable; also used for the private sentinel.
    Private,
    /// In transit between instances.
    Traveling,
}

impl AccessTier {
    /// Human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Public => "Public",
            Self::Friends => "Friends",
            Self::FriendsPlus => "Friends+",
            Self::Invite => "Invite",
            Self::InvitePlus => "Invite+",
            Self::Group => "Group",
            Self::GroupPublic => "Group Public",
            Self::GroupPlus => "Group+",
            Self::Private => "Private",
            Self::Traveling => "Traveling",
        }
    }
}

// =============================================================================
// Region
// =============================================================================

/// Instance hosting region, from the `~region(..)` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
pub enum Region {
    /// United States (default when no tag is present).
    #[default]
    Us,
    /// United States, east coast.
    UsEast,
    /// United States, west coast.
    UsWest,
    /// Europe.
    Eu,
    /// Japan.
    Jp,
}

impl Region {
    /// Map a wire region code. Unknown codes fall back to [`Region::Us`].
    #[must_use]
    pub fn from_code(code: &str) -> Self {
        match code {
            "jp" => Self::Jp,
            "eu" => Self::Eu,
            "use" => Self::UsEast,
            "usw" => Self::UsWest,
            _ => Self::Us,
        }
    }

    /// Human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Us => "US",
            Self::UsEast => "US East",
            Self::UsWest => "US West",
            Self::Eu => "EU",
            Self::Jp => "JP",
        }
    }
}

// =============================================================================
// Parsed Location
// =============================================================================

/// Structured attributes decoded from one location string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLocation {
    /// World id prefix (`wrld_*`); absent for sentinel locations.
    pub world_id: Option<String>,
    /// Short instance id between `:` and the first `~`.
    pub instance_short_id: Option<String>,
    /// Access tier.
    pub access_tier: AccessTier,
    /// Hosting region.
    pub region: Region,
    /// Instance owner (`usr_*`), when encoded.
    pub owner_id: Option<String>,
    /// Owning group (`grp_*`), when encoded.
    pub group_id: Option<String>,
}

impl ParsedLocation {
    const fn sentinel(access_tier: AccessTier) -> Self {
        Self {
            world_id: None,
            instance_short_id: None,
            access_tier,
            region: Region::Us,
            owner_id: None,
            group_id: None,
        }
    }
}

// =============================================================================
// Parsing
// =============================================================================

fn owner_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    #[allow(clippy::expect_used)]
    RE.get_or_init(|| Regex::new(r"\((usr_[^)~(]+)\)").expect("static owner pattern is valid"))
}

fn group_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    #[allow(clippy::expect_used)]
    RE.get_or_init(|| {
        Regex::new(r"~group\((grp_[^)~(]+)\)").expect("static group pattern is valid")
    })
}

fn group_access_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    #[allow(clippy::expect_used)]
    RE.get_or_init(|| {
        Regex::new(r"groupAccessType\((public|members|plus)\)")
            .expect("static group access pattern is valid")
    })
}

fn region_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    #[allow(clippy::expect_used)]
    RE.get_or_init(|| Regex::new(r"~region\(([^)(]*)\)").expect("static region pattern is valid"))
}

/// Decode one location string. Total: never fails, never panics.
#[must_use]
pub fn parse(location: &str) -> ParsedLocation {
    match location {
        "offline" | "private" => return ParsedLocation::sentinel(AccessTier::Private),
        "traveling" => return ParsedLocation::sentinel(AccessTier::Traveling),
        _ => {}
    }

    let Some((world_id, raw)) = location.split_once(':') else {
        // Not a location at all; fall back to an empty public record.
        return ParsedLocation::sentinel(AccessTier::Public);
    };

    let instance_short_id = raw.split('~').next().filter(|s| !s.is_empty());

    let owner_id = owner_re()
        .captures(raw)
        .map(|c| c[1].to_string());
    let group_id = group_re()
        .captures(raw)
        .map(|c| c[1].to_string());

    let access_tier = decode_tier(raw);

    let region = region_re()
        .captures(raw)
        .map_or(Region::Us, |c| Region::from_code(&c[1]));

    ParsedLocation {
        world_id: Some(world_id.to_string()).filter(|w| !w.is_empty()),
        instance_short_id: instance_short_id.map(ToString::to_string),
        access_tier,
        region,
        owner_id,
        group_id,
    }
}

/// Extract just the world id prefix of a location string.
///
/// Sentinel locations and strings without an instance part have no world.
#[must_use]
pub fn world_id_of(location: &str) -> Option<&str> {
    match location {
        "offline" | "private" | "traveling" => None,
        _ => location
            .split_once(':')
            .map(|(world, _)| world)
            .filter(|world| !world.is_empty()),
    }
}

/// Tier tags in priority order: group, private, friends, hidden, public.
fn decode_tier(raw: &str) -> AccessTier {
    if raw.contains("~group(") {
        return match group_access_re().captures(raw).map(|c| c[1].to_string()) {
            Some(kind) if kind == "public" => AccessTier::GroupPublic,
            Some(kind) if kind == "plus" => AccessTier::GroupPlus,
            _ => AccessTier::Group,
        };
    }
    if raw.contains("~private(") {
        return if raw.contains("~canRequestInvite") {
            AccessTier::InvitePlus
        } else {
            AccessTier::Invite
        };
    }
    if raw.contains("~friends(") {
        return AccessTier::Friends;
    }
    if raw.contains("~hidden(") {
        return AccessTier::FriendsPlus;
    }
    AccessTier::Public
}
