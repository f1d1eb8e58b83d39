//! Upstream Platform Adapters
//!
//! Implements the clients that talk to the upstream platform on behalf of
//! one browser session:
//!
//! - **pipeline**: long-lived WebSocket connection delivering friend events
//! - **codec**: double-decoding of the pipeline's envelope frames
//! - **auth**: the forwarded session credential

pub mod auth;
pub mod codec;
pub mod messages;
pub mod pipeline;

pub use auth::{AuthError, SessionToken};
pub use codec::{CodecError, DecodedFrame, EnvelopeCodec};
pub use messages::Envelope;
pub use pipeline::{PipelineClient, PipelineClientConfig, PipelineClientError, PipelineEvent};
