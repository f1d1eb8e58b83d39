//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete adapters that connect the relay's
//! domain events to the outside world.

/// Browser-facing API server (snapshot, stream, worlds).
pub mod api;

/// Configuration loading.
pub mod config;

/// Health check HTTP endpoint.
pub mod health;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// Process-wide request rate limiting.
pub mod ratelimit;

/// The per-session browser push channel.
pub mod relay;

/// Snapshot assembly from upstream paginated reads.
pub mod snapshot;

/// OpenTelemetry tracing integration.
pub mod telemetry;

/// Upstream platform adapters (pipeline WebSocket, credential, codec).
pub mod upstream;
