//! Domain Layer - Core presence view types.
//!
//! Pure types and functions with no I/O: contacts, location decoding, the
//! venue cache, and the activity log.

/// Activity log ring buffer.
pub mod activity;

/// Contact records and presence status.
pub mod contact;

/// Location string decoding.
pub mod location;

/// Venue metadata cache.
pub mod venue;
