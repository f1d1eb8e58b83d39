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

//! Lookout Client - Browser State Engine
//!
//! The browser-side half of Lookout: reconstructs grouped, sorted view
//! state from the relay's initial snapshot plus an unbounded sequence of
//! incremental push events, and keeps durable side-state (location-change
//! timestamps, venue cache, activity log) across reloads.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Pure presence types
//!   - `contact`: contact records and status vocabulary
//!   - `location`: total decoding of the location string encoding
//!   - `venue`: TTL-bounded venue metadata cache
//!   - `activity`: the capped activity log
//!
//! - **Application**: The reconciler and its ports
//!   - `ports`: transport, snapshot, world, and storage contracts
//!   - `store`: the owned contact store (single writer)
//!   - `view`: grouped/sorted view state, rebuilt on every change
//!   - `reconciler`: the event loop, reconnect backoff, logged-out latch
//!
//! - **Infrastructure**: Port adapters
//!   - `transport`: SSE channel consumption
//!   - `http`: relay JSON routes
//!   - `storage`: in-memory and JSON-file storage
//!
//! # Data Flow
//!
//! ```text
//! Relay SSE ──► transport ──► Reconciler ──► watch<ViewState> ──► UI
//!                                 │
//! Relay HTTP ◄── snapshot/worlds ─┘   storage ◄── log/stamps/venues
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Pure presence types with no I/O.
pub mod domain;

/// Application layer - The reconciler and its ports.
pub mod application;

/// Infrastructure layer - Port adapters.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::activity::{ActivityLog, LOG_CAPACITY, LogEntry, LogKind};
pub use domain::contact::{Contact, Status};
pub use domain::location::{AccessTier, ParsedLocation, Region, parse, world_id_of};
pub use domain::venue::{VENUE_CACHE_TTL_HOURS, VenueCache, VenueEntry};

// Application types
pub use application::ports::{
    PushEvent, RelayMessage, RelayTransport, SnapshotApi, SnapshotPayload, StateStorage,
    TransportError, WorldDirectory, WorldMetadata,
};
pub use application::reconciler::{Reconciler, ReconcilerConfig, ReconcilerHandle};
pub use application::store::{ContactStore, LocationStamp};
pub use application::view::{ConnectionStatus, InstanceView, ViewState, build_instances, build_view};

// Infrastructure adapters
pub use infrastructure::http::{RelayApi, RelayEndpoint};
pub use infrastructure::storage::{JsonFileStorage, MemoryStorage};
pub use infrastructure::transport::SseTransport;
