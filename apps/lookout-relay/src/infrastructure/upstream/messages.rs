//! Pipeline Wire Format
//!
//! Outer frame types for the upstream pipeline WebSocket. Every frame is a
//! JSON envelope whose `content` field is itself a serialized JSON string
//! that must be decoded a second time to obtain the real payload.
//!
//! # Wire Format (JSON)
//!
//! ```json
//! {
//!   "type": "friend-location",
//!   "content": "{\"userId\":\"usr_1\",\"location\":\"wrld_a:1~friends(usr_1)\"}"
//! }
//! ```

use serde::{Deserialize, Serialize};

/// Outer envelope of every pipeline frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Pipeline event type, e.g. `friend-online`.
    #[serde(rename = "type")]
    pub event_type: String,

    /// Inner payload, serialized a second time.
    ///
    /// Some control frames omit it entirely.
    #[serde(default)]
    pub content: Option<String>,
}
