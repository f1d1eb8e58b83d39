//! Application Layer - The reconciler and its ports.
//!
//! This layer owns the session state: the contact store, the view
//! builder, and the reconciler loop that merges snapshots and push events
//! under a single writer.

/// Port interfaces for the relay server and durable storage.
pub mod ports;

/// The reconciler loop and reconnect scheduling.
pub mod reconciler;

/// The owned contact store and its mutation protocol.
pub mod store;

/// Grouped, sorted view state.
pub mod view;
