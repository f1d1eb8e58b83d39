#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::option_if_let_else,
        clippy::default_trait_access,
        clippy::items_after_statements
    )
)]

//! Lookout Relay - Presence Event Relay
//!
//! An HTTP service that maintains one upstream pipeline WebSocket
//! connection per logged-in browser session and re-publishes friend
//! presence events to that session over a server-sent-events channel.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Classified presence events
//!   - `event`: event kinds and typed payloads
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `upstream`: pipeline WebSocket client, envelope codec, credential
//!   - `relay`: per-session SSE bridging with heartbeats
//!   - `snapshot`: paginated bulk reads and enrichment
//!   - `api`: browser-facing HTTP surface
//!   - `ratelimit`: process-wide request throttling
//!   - `config`: environment configuration
//!   - `health`: health check HTTP endpoint
//!
//! # Data Flow
//!
//! ```text
//! Pipeline WS ──► Adapter ──► Relay session ──► SSE ──► Browser tab
//!                                  ▲
//! REST API  ──► Snapshot Fetcher ──┘ (initial state + periodic refresh)
//! ```
//!
//! Each browser session owns its own adapter and relay pair; sessions
//! share only the world cache and the rate limiter.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Presence event types with no external dependencies.
pub mod domain;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::event::{EventKind, FriendEvent};

// Infrastructure config
pub use infrastructure::config::{ConfigError, RelayConfig, ServerSettings, UpstreamSettings};

// API server
pub use infrastructure::api::{ApiServer, ApiServerError, ApiState};

// Health server
pub use infrastructure::health::{HealthServer, HealthServerError, HealthServerState};

// Relay sessions (for integration tests)
pub use infrastructure::relay::{RelaySettings, SessionRegistry};

// Snapshot fetcher (for integration tests)
pub use infrastructure::snapshot::{Snapshot, SnapshotFetcher, SnapshotSettings, UpstreamApi};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
