//! Infrastructure Layer - Adapters for the reconciler's ports.

/// Relay HTTP client (snapshot and world routes).
pub mod http;

/// Durable local storage adapters.
pub mod storage;

/// SSE relay transport.
pub mod transport;
