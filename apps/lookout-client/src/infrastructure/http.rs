//! Relay HTTP Client
//!
//! Implements the [`SnapshotApi`] and [`WorldDirectory`] ports against the
//! relay server's JSON routes. Every request carries the upstream session
//! cookie; a 401 means the user must log in again.

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::COOKIE;
use serde::Deserialize;

use crate::application::ports::{
    SnapshotApi, SnapshotPayload, TransportError, WorldDirectory, WorldMetadata,
};

/// Where the relay lives and how to authenticate to it.
#[derive(Debug, Clone)]
pub struct RelayEndpoint {
    /// Relay base URL, e.g. `http://localhost:8080`.
    pub base_url: String,
    /// `Cookie` header value carrying the upstream session credential.
    pub auth_cookie: String,
}

impl RelayEndpoint {
    /// Create an endpoint description.
    #[must_use]
    pub fn new(base_url: impl Into<String>, auth_cookie: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_cookie: auth_cookie.into(),
        }
    }
}

/// JSON client for the relay's fetch routes.
#[derive(Debug, Clone)]
pub struct RelayApi {
    http: reqwest::Client,
    endpoint: RelayEndpoint,
}

impl RelayApi {
    /// Create a client.
    #[must_use]
    pub const fn new(http: reqwest::Client, endpoint: RelayEndpoint) -> Self {
        Self { http, endpoint }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<T, TransportError> {
        let url = format!("{}{path}", self.endpoint.base_url);
        let response = self
            .http
            .get(&url)
            .header(COOKIE, &self.endpoint.auth_cookie)
            .send()
            .await
            .map_err(|e| TransportError::Connection(e.to_string()))?;

        match response.status() {
            StatusCode::UNAUTHORIZED => Err(TransportError::Unauthorized),
            status if !status.is_success() => {
                Err(TransportError::Connection(format!("status {status}")))
            }
            _ => response
                .json()
                .await
                .map_err(|e| TransportError::Decode(e.to_string())),
        }
    }
}

#[async_trait]
impl SnapshotApi for RelayApi {
    async fn fetch(&self) -> Result<SnapshotPayload, TransportError> {
        self.get_json("/api/snapshot").await
    }
}

/// Shape of the relay's world route.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WorldBody {
    name: String,
    #[serde(default)]
    thumbnail: Option<String>,
    #[serde(default)]
    capacity: Option<u32>,
}

#[async_trait]
impl WorldDirectory for RelayApi {
    async fn world(&self, world_id: &str) -> Result<WorldMetadata, TransportError> {
        let body: WorldBody = self.get_json(&format!("/api/worlds/{world_id}")).await?;
        Ok(WorldMetadata {
            name: body.name,
            thumbnail: body.thumbnail,
            capacity: body.capacity,
        })
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn api(server: &MockServer) -> RelayApi {
        RelayApi::new(
            reqwest::Client::new(),
            RelayEndpoint::new(server.uri(), "auth=authcookie_test"),
        )
    }

    #[tokio::test]
    async fn snapshot_fetch_sends_cookie() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/snapshot"))
            .and(header("cookie", "auth=authcookie_test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "friends": [],
                "offlineFriends": [],
            })))
            .mount(&server)
            .await;

        let payload = api(&server).fetch().await.unwrap();
        assert!(payload.friends.is_empty());
    }

    #[tokio::test]
    async fn unauthorized_maps_to_dedicated_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/snapshot"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        assert!(matches!(
            api(&server).fetch().await,
            Err(TransportError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn world_lookup_decodes_metadata() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/worlds/wrld_a"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "wrld_a",
                "name": "The Garden",
                "thumbnail": "https://img.test/garden.png",
                "capacity": 32,
            })))
            .mount(&server)
            .await;

        let world = api(&server).world("wrld_a").await.unwrap();
        assert_eq!(world.name, "The Garden");
        assert_eq!(world.capacity, Some(32));
    }
}
