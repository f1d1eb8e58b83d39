//! Browser-Facing API Server
//!
//! HTTP surface consumed by the dashboard:
//!
//! - `GET /api/snapshot` - full state built by the snapshot fetcher
//! - `GET /api/stream` - the SSE push channel (one relay session)
//! - `GET /api/worlds/{world_id}` - world metadata for client-side venue
//!   resolution
//!
//! Every route requires the forwarded upstream session cookie and passes
//! through the process-wide rate limiter, keyed by client identity.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::sse::Sse;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::infrastructure::ratelimit::RateLimiter;
use crate::infrastructure::relay::{self, RelaySettings, SessionRegistry};
use crate::infrastructure::snapshot::{ApiError, Snapshot, SnapshotError, SnapshotFetcher};
use crate::infrastructure::upstream::{AuthError, SessionToken};

// =============================================================================
// Error Types
// =============================================================================

/// Errors surfaced by API routes.
#[derive(Debug, thiserror::Error)]
pub enum ApiRouteError {
    /// Missing or rejected session credential.
    #[error("authentication required")]
    Unauthorized,

    /// Client exceeded the request budget.
    #[error("rate limited")]
    RateLimited,

    /// The upstream platform failed.
    #[error("upstream error: {0}")]
    Upstream(String),
}

impl From<AuthError> for ApiRouteError {
    fn from(_: AuthError) -> Self {
        Self::Unauthorized
    }
}

impl From<SnapshotError> for ApiRouteError {
    fn from(e: SnapshotError) -> Self {
        match e {
            SnapshotError::Unauthorized => Self::Unauthorized,
            SnapshotError::NoData(source) => Self::Upstream(source.to_string()),
        }
    }
}

impl From<ApiError> for ApiRouteError {
    fn from(e: ApiError) -> Self {
        match e {
            ApiError::Unauthorized => Self::Unauthorized,
            other => Self::Upstream(other.to_string()),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiRouteError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
        };
        let body = Json(ErrorBody {
            error: self.to_string(),
        });
        (status, body).into_response()
    }
}

// =============================================================================
// Server State
// =============================================================================

/// Shared state for the API server.
pub struct ApiState {
    /// Snapshot fetcher (owns the world cache).
    pub fetcher: SnapshotFetcher,
    /// Per-session relay settings.
    pub relay: RelaySettings,
    /// Session counters for health reporting.
    pub registry: Arc<SessionRegistry>,
    /// Process-wide request limiter.
    pub limiter: Arc<RateLimiter>,
    /// Root shutdown token; relay sessions are children of it.
    pub shutdown: CancellationToken,
}

// =============================================================================
// API Server
// =============================================================================

/// Browser-facing HTTP server.
pub struct ApiServer {
    port: u16,
    state: Arc<ApiState>,
    cancel: CancellationToken,
}

/// Errors from running the API server.
#[derive(Debug, thiserror::Error)]
pub enum ApiServerError {
    /// Failed to bind the listen port.
    #[error("failed to bind port {0}: {1}")]
    BindFailed(u16, String),
    /// The HTTP server failed while running.
    #[error("API server failed: {0}")]
    ServerFailed(String),
}

impl ApiServer {
    /// Create a new API server.
    #[must_use]
    pub const fn new(port: u16, state: Arc<ApiState>, cancel: CancellationToken) -> Self {
        Self {
            port,
            state,
            cancel,
        }
    }

    /// Run the API server until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `ApiServerError` if binding fails or the HTTP server
    /// encounters a fatal error while running.
    pub async fn run(self) -> Result<(), ApiServerError> {
        let app = router(self.state);

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ApiServerError::BindFailed(self.port, e.to_string()))?;

        tracing::info!(port = self.port, "API server listening");

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(self.cancel.cancelled_owned())
        .await
        .map_err(|e| ApiServerError::ServerFailed(e.to_string()))?;

        tracing::info!("API server stopped");
        Ok(())
    }
}

/// Build the API router.
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/api/snapshot", get(snapshot_handler))
        .route("/api/stream", get(stream_handler))
        .route("/api/worlds/{world_id}", get(world_handler))
        .with_state(state)
}

// =============================================================================
// HTTP Handlers
// =============================================================================

async fn snapshot_handler(
    State(state): State<Arc<ApiState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Result<Json<Snapshot>, ApiRouteError> {
    let token = admit(&state, &headers, peer)?;
    let snapshot = state.fetcher.fetch(&token).await?;
    Ok(Json(snapshot))
}

async fn stream_handler(
    State(state): State<Arc<ApiState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Result<Sse<relay::RelayStream>, ApiRouteError> {
    let token = admit(&state, &headers, peer)?;
    let stream = relay::open_session(&state.relay, token, &state.registry, &state.shutdown);
    Ok(Sse::new(stream))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WorldBody {
    id: String,
    name: String,
    thumbnail: Option<String>,
    capacity: Option<u32>,
}

async fn world_handler(
    State(state): State<Arc<ApiState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Path(world_id): Path<String>,
) -> Result<Json<WorldBody>, ApiRouteError> {
    let token = admit(&state, &headers, peer)?;
    let info = state.fetcher.resolve_world(&token, &world_id).await?;
    Ok(Json(WorldBody {
        id: world_id,
        name: info.name,
        thumbnail: info.thumbnail,
        capacity: info.capacity,
    }))
}

// =============================================================================
// Request Admission
// =============================================================================

/// Rate-limit the caller and extract its session credential.
fn admit(
    state: &ApiState,
    headers: &HeaderMap,
    peer: SocketAddr,
) -> Result<SessionToken, ApiRouteError> {
    let identity = client_identity(headers, peer);
    if !state.limiter.check(&identity) {
        return Err(ApiRouteError::RateLimited);
    }

    let cookie_header = headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiRouteError::Unauthorized)?;

    Ok(SessionToken::from_cookie_header(cookie_header)?)
}

/// Identity key for rate limiting: forwarded-for when present, else peer IP.
fn client_identity(headers: &HeaderMap, peer: SocketAddr) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| peer.ip().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.9, 10.0.0.1".parse().unwrap());
        let peer: SocketAddr = "127.0.0.1:9999".parse().unwrap();
        assert_eq!(client_identity(&headers, peer), "203.0.113.9");
    }

    #[test]
    fn identity_falls_back_to_peer() {
        let headers = HeaderMap::new();
        let peer: SocketAddr = "192.0.2.4:9999".parse().unwrap();
        assert_eq!(client_identity(&headers, peer), "192.0.2.4");
    }

    #[test]
    fn auth_error_maps_to_unauthorized() {
        let err: ApiRouteError = AuthError::MissingCredential.into();
        assert!(matches!(err, ApiRouteError::Unauthorized));
    }
}
