//! SSE Relay Transport
//!
//! Implements the [`RelayTransport`] port over the relay's
//! server-sent-events route. Frames arrive as `event:`/`data:` blocks
//! separated by blank lines; the decoder is incremental because chunk
//! boundaries fall anywhere.
//!
//! Per the error taxonomy, malformed event payloads are dropped and
//! debug-logged, never surfaced to state; only transport-level failures
//! end the stream.

use std::collections::VecDeque;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures_util::StreamExt;
use reqwest::StatusCode;
use reqwest::header::COOKIE;

use crate::application::ports::{EventStream, PushEvent, RelayMessage, RelayTransport, TransportError};

use super::http::RelayEndpoint;

// =============================================================================
// Frame Decoder
// =============================================================================

/// One parsed SSE frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    /// Event name; the SSE default is `message`.
    pub event: String,
    /// Data payload, possibly spanning multiple `data:` lines.
    pub data: String,
}

/// Incremental SSE frame decoder.
#[derive(Debug, Default)]
pub struct SseFrameDecoder {
    buffer: String,
}

impl SseFrameDecoder {
    /// Create an empty decoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk, returning every frame completed by it.
    pub fn push(&mut self, chunk: &str) -> Vec<SseFrame> {
        self.buffer.push_str(&chunk.replace("\r\n", "\n"));

        let mut frames = Vec::new();
        while let Some(boundary) = self.buffer.find("\n\n") {
            let block: String = self.buffer.drain(..boundary + 2).collect();
            if let Some(frame) = parse_block(&block) {
                frames.push(frame);
            }
        }
        frames
    }
}

fn parse_block(block: &str) -> Option<SseFrame> {
    let mut event = "message".to_string();
    let mut data_lines: Vec<&str> = Vec::new();

    for line in block.lines() {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = line.split_once(':').unwrap_or((line, ""));
        let value = value.strip_prefix(' ').unwrap_or(value);
        match field {
            "event" => event = value.to_string(),
            "data" => data_lines.push(value),
            _ => {}
        }
    }

    if data_lines.is_empty() {
        return None;
    }
    Some(SseFrame {
        event,
        data: data_lines.join("\n"),
    })
}

// =============================================================================
// Message Mapping
// =============================================================================

/// Map one frame to a relay message; `None` drops the frame.
fn map_frame(frame: &SseFrame) -> Option<RelayMessage> {
    match frame.event.as_str() {
        "connected" => Some(RelayMessage::Connected),
        "ping" => Some(RelayMessage::Ping),
        "disconnected" => Some(RelayMessage::Disconnected),
        "error" => {
            let message = serde_json::from_str::<serde_json::Value>(&frame.data)
                .ok()
                .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
                .unwrap_or_else(|| frame.data.clone());
            Some(RelayMessage::Error(message))
        }
        name => match PushEvent::decode(name, &frame.data)? {
            Ok(event) => Some(RelayMessage::Event(event)),
            Err(error) => {
                tracing::debug!(event = %name, %error, "Dropping undecodable event");
                None
            }
        },
    }
}

// =============================================================================
// Transport
// =============================================================================

/// SSE implementation of the relay transport.
#[derive(Debug, Clone)]
pub struct SseTransport {
    http: reqwest::Client,
    endpoint: RelayEndpoint,
}

impl SseTransport {
    /// Create a transport.
    #[must_use]
    pub const fn new(http: reqwest::Client, endpoint: RelayEndpoint) -> Self {
        Self { http, endpoint }
    }
}

struct StreamState {
    body: BoxStream<'static, reqwest::Result<Bytes>>,
    decoder: SseFrameDecoder,
    queue: VecDeque<RelayMessage>,
    done: bool,
}

#[async_trait]
impl RelayTransport for SseTransport {
    async fn connect(&self) -> Result<EventStream, TransportError> {
        let url = format!("{}/api/stream", self.endpoint.base_url);
        let response = self
            .http
            .get(&url)
            .header(COOKIE, &self.endpoint.auth_cookie)
            .send()
            .await
            .map_err(|e| TransportError::Connection(e.to_string()))?;

        match response.status() {
            StatusCode::UNAUTHORIZED => return Err(TransportError::Unauthorized),
            status if !status.is_success() => {
                return Err(TransportError::Connection(format!("status {status}")));
            }
            _ => {}
        }

        let state = StreamState {
            body: response.bytes_stream().boxed(),
            decoder: SseFrameDecoder::new(),
            queue: VecDeque::new(),
            done: false,
        };

        Ok(futures::stream::unfold(state, next_message).boxed())
    }
}

async fn next_message(mut state: StreamState) -> Option<(RelayMessage, StreamState)> {
    loop {
        if let Some(message) = state.queue.pop_front() {
            return Some((message, state));
        }
        if state.done {
            return None;
        }

        match state.body.next().await {
            Some(Ok(chunk)) => {
                let text = String::from_utf8_lossy(&chunk).into_owned();
                for frame in state.decoder.push(&text) {
                    if let Some(message) = map_frame(&frame) {
                        state.queue.push_back(message);
                    }
                }
            }
            Some(Err(error)) => {
                state.done = true;
                state
                    .queue
                    .push_back(RelayMessage::Error(error.to_string()));
            }
            None => {
                state.done = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decoder_handles_split_chunks() {
        let mut decoder = SseFrameDecoder::new();

        assert!(decoder.push("event: friend-onl").is_empty());
        let frames = decoder.push("ine\ndata: {\"userId\":\"usr_1\"}\n\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event, "friend-online");
        assert_eq!(frames[0].data, "{\"userId\":\"usr_1\"}");
    }

    #[test]
    fn decoder_handles_multiple_frames_per_chunk() {
        let mut decoder = SseFrameDecoder::new();
        let frames = decoder.push("event: ping\ndata: 1\n\nevent: ping\ndata: 2\n\n");
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].data, "2");
    }

    #[test]
    fn decoder_joins_multi_line_data() {
        let mut decoder = SseFrameDecoder::new();
        let frames = decoder.push("data: a\ndata: b\n\n");
        assert_eq!(frames[0].data, "a\nb");
        assert_eq!(frames[0].event, "message");
    }

    #[test]
    fn decoder_ignores_comments_and_dataless_blocks() {
        let mut decoder = SseFrameDecoder::new();
        assert!(decoder.push(": keepalive\n\n").is_empty());
        assert!(decoder.push("event: lonely\n\n").is_empty());
    }

    #[test]
    fn frames_map_to_relay_messages() {
        let frame = SseFrame {
            event: "connected".to_string(),
            data: "{}".to_string(),
        };
        assert_eq!(map_frame(&frame), Some(RelayMessage::Connected));

        let frame = SseFrame {
            event: "error".to_string(),
            data: r#"{"message":"upstream gone"}"#.to_string(),
        };
        assert_eq!(
            map_frame(&frame),
            Some(RelayMessage::Error("upstream gone".to_string()))
        );

        let frame = SseFrame {
            event: "friend-offline".to_string(),
            data: r#"{"userId":"usr_1"}"#.to_string(),
        };
        assert!(matches!(
            map_frame(&frame),
            Some(RelayMessage::Event(PushEvent::Offline(_)))
        ));
    }

    #[test]
    fn malformed_event_payloads_are_dropped() {
        let frame = SseFrame {
            event: "friend-online".to_string(),
            data: "not json".to_string(),
        };
        assert_eq!(map_frame(&frame), None);

        let frame = SseFrame {
            event: "unrelated".to_string(),
            data: "{}".to_string(),
        };
        assert_eq!(map_frame(&frame), None);
    }
}
