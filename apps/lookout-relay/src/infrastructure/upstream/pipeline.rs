//! Pipeline WebSocket Client
//!
//! Maintains one long-lived connection to the upstream pipeline stream for
//! a single browser session and emits classified [`FriendEvent`]s.
//!
//! # Stream URL
//!
//! `wss://pipeline.vrchat.cloud/?authToken=<session credential>`
//!
//! # Lifecycle
//!
//! The client connects once, emits `Connected`, forwards decoded frames,
//! and terminates with `Disconnected` (remote close) or `Error` (transport
//! failure). It never reconnects: the browser-side engine reopens the whole
//! relay connection instead, so a second connect attempt here would race
//! with it.

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::USER_AGENT;
use tokio_util::sync::CancellationToken;

use crate::domain::event::FriendEvent;
use crate::infrastructure::metrics;

use super::auth::SessionToken;
use super::codec::{CodecError, DecodedFrame, EnvelopeCodec, IgnoreReason};

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur in the pipeline client.
#[derive(Debug, thiserror::Error)]
pub enum PipelineClientError {
    /// The handshake request could not be built.
    #[error("invalid pipeline URL: {0}")]
    InvalidUrl(String),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Codec error on the outer envelope.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

// =============================================================================
// Pipeline Events
// =============================================================================

/// Events emitted by the pipeline client.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// Successfully connected.
    Connected,
    /// A classified friend event.
    Event(FriendEvent),
    /// The remote side closed the connection.
    Disconnected,
    /// Transport or protocol failure.
    Error(String),
}

// =============================================================================
// Pipeline Client Configuration
// =============================================================================

/// Configuration for one pipeline connection.
#[derive(Debug, Clone)]
pub struct PipelineClientConfig {
    /// Base WebSocket URL (no query string).
    pub base_url: String,
    /// User agent presented to the upstream platform.
    pub user_agent: String,
}

impl PipelineClientConfig {
    /// Create a new configuration.
    #[must_use]
    pub const fn new(base_url: String, user_agent: String) -> Self {
        Self {
            base_url,
            user_agent,
        }
    }

    /// Full connection URL for the given session credential.
    #[must_use]
    pub fn url_for(&self, token: &SessionToken) -> String {
        format!("{}/?authToken={}", self.base_url.trim_end_matches('/'), token.value())
    }
}

/// Keeps the open-connection gauge honest on every exit path.
struct ConnectionGauge;

impl ConnectionGauge {
    fn open() -> Self {
        metrics::pipeline_connection_opened();
        Self
    }
}

impl Drop for ConnectionGauge {
    fn drop(&mut self) {
        metrics::pipeline_connection_closed();
    }
}

// =============================================================================
// Pipeline Client
// =============================================================================

/// Pipeline WebSocket client scoped to one browser session.
pub struct PipelineClient {
    config: PipelineClientConfig,
    token: SessionToken,
    codec: EnvelopeCodec,
    event_tx: mpsc::Sender<PipelineEvent>,
    cancel: CancellationToken,
}

impl PipelineClient {
    /// Create a new pipeline client.
    #[must_use]
    pub const fn new(
        config: PipelineClientConfig,
        token: SessionToken,
        event_tx: mpsc::Sender<PipelineEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            token,
            codec: EnvelopeCodec::new(),
            event_tx,
            cancel,
        }
    }

    /// Run the connection until cancelled, closed, or failed.
    ///
    /// Emits a terminal `Disconnected` or `Error` event before returning;
    /// cancellation is silent.
    ///
    /// # Errors
    ///
    /// Returns `PipelineClientError` when the connection cannot be
    /// established or fails mid-stream. The caller does not retry.
    pub async fn run(self) -> Result<(), PipelineClientError> {
        let result = self.connect_and_run().await;

        match &result {
            Ok(()) => {
                let _ = self.event_tx.send(PipelineEvent::Disconnected).await;
            }
            Err(e) => {
                let _ = self
                    .event_tx
                    .send(PipelineEvent::Error(e.to_string()))
                    .await;
            }
        }

        result
    }

    async fn connect_and_run(&self) -> Result<(), PipelineClientError> {
        let url = self.config.url_for(&self.token);
        tracing::info!(base_url = %self.config.base_url, "Connecting to pipeline");

        let mut request = url
            .into_client_request()
            .map_err(|e| PipelineClientError::InvalidUrl(e.to_string()))?;
        request.headers_mut().insert(
            USER_AGENT,
            self.config
                .user_agent
                .parse()
                .map_err(|_| PipelineClientError::InvalidUrl("bad user agent".to_string()))?,
        );

        let (ws_stream, _response) = tokio_tungstenite::connect_async(request).await?;
        let (mut write, mut read) = ws_stream.split();

        let _gauge = ConnectionGauge::open();
        let _ = self.event_tx.send(PipelineEvent::Connected).await;

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    tracing::debug!("Pipeline client cancelled");
                    let _ = write.send(Message::Close(None)).await;
                    return Ok(());
                }
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            self.handle_text_frame(&text).await;
                        }
                        Some(Ok(Message::Ping(data))) => {
                            write.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Close(_))) => {
                            tracing::info!("Pipeline sent close frame");
                            return Ok(());
                        }
                        Some(Ok(_)) => {
                            // Pipeline only sends text frames; ignore the rest.
                        }
                        Some(Err(e)) => {
                            return Err(e.into());
                        }
                        None => {
                            tracing::info!("Pipeline stream ended");
                            return Ok(());
                        }
                    }
                }
            }
        }
    }

    /// Decode one text frame and forward the classified event.
    ///
    /// Malformed frames are dropped: a bad frame must not tear down the
    /// session, only a transport failure does.
    async fn handle_text_frame(&self, text: &str) {
        match self.codec.decode(text) {
            Ok(DecodedFrame::Event(event)) => {
                metrics::record_event_received(event.kind());
                let _ = self.event_tx.send(PipelineEvent::Event(event)).await;
            }
            Ok(DecodedFrame::Ignored { event_type, reason }) => {
                metrics::record_frame_dropped();
                match reason {
                    IgnoreReason::UnknownType => {
                        tracing::trace!(%event_type, "Ignoring unknown pipeline type");
                    }
                    IgnoreReason::MissingContent | IgnoreReason::MalformedContent => {
                        tracing::debug!(%event_type, ?reason, "Dropping unusable frame");
                    }
                }
            }
            Err(error) => {
                metrics::record_frame_dropped();
                tracing::debug!(%error, "Dropping malformed envelope");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_carries_auth_token() {
        let config = PipelineClientConfig::new(
            "wss://pipeline.vrchat.cloud".to_string(),
            "lookout/0.1".to_string(),
        );
        let token = SessionToken::new("authcookie_abc").unwrap();
        assert_eq!(
            config.url_for(&token),
            "wss://pipeline.vrchat.cloud/?authToken=authcookie_abc"
        );
    }

    #[test]
    fn url_trims_trailing_slash() {
        let config = PipelineClientConfig::new(
            "wss://pipeline.vrchat.cloud/".to_string(),
            "lookout/0.1".to_string(),
        );
        let token = SessionToken::new("t").unwrap();
        assert_eq!(
            config.url_for(&token),
            "wss://pipeline.vrchat.cloud/?authToken=t"
        );
    }
}
