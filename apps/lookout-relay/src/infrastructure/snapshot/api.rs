//! Upstream REST Client
//!
//! Thin typed wrapper over the upstream platform's REST API, used by the
//! snapshot fetcher. Every call forwards the browser session's `auth`
//! cookie; the relay holds no credentials of its own.
//!
//! # Endpoints
//!
//! - `GET /auth/user/friends?offline=false&n=..&offset=..` - online friends
//! - `GET /favorites?type=friend&n=..&offset=..` - favorited friend ids
//! - `GET /users/{id}` - single profile (offline favorites backfill)
//! - `GET /worlds/{id}` - world metadata
//! - `GET /instances/{location}` - live instance occupancy

use reqwest::StatusCode;
use reqwest::header::{COOKIE, USER_AGENT};
use serde::Deserialize;

use crate::infrastructure::upstream::SessionToken;

// =============================================================================
// Error Types
// =============================================================================

/// Errors from upstream REST calls.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The upstream platform rejected the session credential.
    #[error("upstream rejected session credential")]
    Unauthorized,

    /// Upstream returned a non-success status.
    #[error("upstream returned status {0}")]
    Status(StatusCode),

    /// Transport-level failure.
    #[error("upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl ApiError {
    fn from_status(status: StatusCode) -> Self {
        if status == StatusCode::UNAUTHORIZED {
            Self::Unauthorized
        } else {
            Self::Status(status)
        }
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// A friend record as returned by the friends listing and `/users/{id}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendRecord {
    /// Opaque user id (`usr_*`).
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
    /// Current location string, absent for offline profiles.
    #[serde(default)]
    pub location: Option<String>,
}

/// One favorites entry: which friend, and which ordinal group bucket.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteRecord {
    /// Favorite entry id (not the user id).
    pub id: String,
    /// The favorited user's id.
    pub favorite_id: String,
    /// Group-membership tags, e.g. `["group_0"]`.
    #[serde(default)]
    pub tags: Vec<String>,
}

/// World metadata.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldRecord {
    /// Opaque world id (`wrld_*`).
    pub id: String,
    /// Display name.
    pub name: String,
    /// Thumbnail URL.
    #[serde(default)]
    pub thumbnail_image_url: Option<String>,
    /// Instance capacity.
    #[serde(default)]
    pub capacity: Option<u32>,
}

/// Live instance occupancy.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceRecord {
    /// Current occupant count.
    #[serde(default)]
    pub n_users: Option<u32>,
}

// =============================================================================
// Client
// =============================================================================

/// Typed upstream REST client.
#[derive(Debug, Clone)]
pub struct UpstreamApi {
    http: reqwest::Client,
    base_url: String,
    user_agent: String,
}

impl UpstreamApi {
    /// Create a new client.
    #[must_use]
    pub fn new(http: reqwest::Client, base_url: String, user_agent: String) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            user_agent,
        }
    }

    /// Fetch one page of currently-online friends.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` on auth rejection, non-success status, or
    /// transport failure.
    pub async fn online_friends_page(
        &self,
        token: &SessionToken,
        page_size: usize,
        offset: usize,
    ) -> Result<Vec<FriendRecord>, ApiError> {
        let url = format!(
            "{}/auth/user/friends?offline=false&n={page_size}&offset={offset}",
            self.base_url
        );
        self.get_json(token, &url).await
    }

    /// Fetch one page of favorited-friend entries.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` on auth rejection, non-success status, or
    /// transport failure.
    pub async fn favorites_page(
        &self,
        token: &SessionToken,
        page_size: usize,
        offset: usize,
    ) -> Result<Vec<FavoriteRecord>, ApiError> {
        let url = format!(
            "{}/favorites?type=friend&n={page_size}&offset={offset}",
            self.base_url
        );
        self.get_json(token, &url).await
    }

    /// Fetch a single profile by user id.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` on auth rejection, non-success status, or
    /// transport failure.
    pub async fn user(&self, token: &SessionToken, user_id: &str) -> Result<FriendRecord, ApiError> {
        let url = format!("{}/users/{user_id}", self.base_url);
        self.get_json(token, &url).await
    }

    /// Fetch world metadata by world id.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` on auth rejection, non-success status, or
    /// transport failure.
    pub async fn world(&self, token: &SessionToken, world_id: &str) -> Result<WorldRecord, ApiError> {
        let url = format!("{}/worlds/{world_id}", self.base_url);
        self.get_json(token, &url).await
    }

    /// Fetch live occupancy for a full location string.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` on auth rejection, non-success status, or
    /// transport failure.
    pub async fn instance(
        &self,
        token: &SessionToken,
        location: &str,
    ) -> Result<InstanceRecord, ApiError> {
        let url = format!("{}/instances/{location}", self.base_url);
        self.get_json(token, &url).await
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        token: &SessionToken,
        url: &str,
    ) -> Result<T, ApiError> {
        let response = self
            .http
            .get(url)
            .header(COOKIE, token.as_cookie_header())
            .header(USER_AGENT, &self.user_agent)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::from_status(status));
        }

        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_status_maps_to_auth_error() {
        assert!(matches!(
            ApiError::from_status(StatusCode::UNAUTHORIZED),
            ApiError::Unauthorized
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::TOO_MANY_REQUESTS),
            ApiError::Status(StatusCode::TOO_MANY_REQUESTS)
        ));
    }

    #[test]
    fn friend_record_deserializes_platform_fields() {
        let json = r#"{
            "id": "usr_1",
            "displayName": "willow",
            "status": "join me",
            "statusDescription": "",
            "userIcon": "https://example.test/icon.png",
            "platform": "standalonewindows",
            "location": "wrld_a:1~friends(usr_1)"
        }"#;
        let record: FriendRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.display_name, "willow");
        assert_eq!(record.location.as_deref(), Some("wrld_a:1~friends(usr_1)"));
    }

    #[test]
    fn favorite_record_carries_group_tags() {
        let json = r#"{"id":"fvrt_1","type":"friend","favoriteId":"usr_1","tags":["group_2"]}"#;
        let record: FavoriteRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.favorite_id, "usr_1");
        assert_eq!(record.tags, vec!["group_2".to_string()]);
    }
}
