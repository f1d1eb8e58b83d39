//! Pipeline Envelope Codec
//!
//! Decodes raw pipeline frames into classified [`FriendEvent`]s. Decoding
//! happens in two steps: the outer envelope `{type, content}` is parsed,
//! then `content` is parsed again as the payload for the classified kind.
//!
//! Frames whose `type` the relay does not understand, and frames whose
//! payload fails to parse, are reported as [`DecodedFrame::Ignored`] so the
//! caller can count and drop them; a malformed frame never tears down the
//! connection.

use crate::domain::event::{
    EventKind, FriendEvent, FriendLocation, FriendOffline, FriendOnline, FriendUpdate,
};

use super::messages::Envelope;

// =============================================================================
// Error Types
// =============================================================================

/// Codec errors.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The outer envelope was not valid JSON.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(#[source] serde_json::Error),
}

// =============================================================================
// Decoded Frame
// =============================================================================

/// Outcome of decoding one pipeline frame.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedFrame {
    /// A classified friend event, ready to forward.
    Event(FriendEvent),
    /// A frame the relay drops: unknown type or unusable payload.
    Ignored {
        /// The pipeline `type` value of the dropped frame.
        event_type: String,
        /// Why the frame was dropped.
        reason: IgnoreReason,
    },
}

/// Why a frame was ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// The pipeline type is not one the relay understands.
    UnknownType,
    /// The envelope had no `content` to decode.
    MissingContent,
    /// The inner payload failed to parse for its kind.
    MalformedContent,
}

// =============================================================================
// Codec
// =============================================================================

/// Decoder for pipeline envelope frames.
#[derive(Debug, Default, Clone)]
pub struct EnvelopeCodec;

impl EnvelopeCodec {
    /// Create a new codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Decode one raw text frame.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::MalformedEnvelope`] only when the outer frame
    /// is not valid JSON. Unknown types and bad inner payloads are reported
    /// as [`DecodedFrame::Ignored`], not as errors.
    pub fn decode(&self, text: &str) -> Result<DecodedFrame, CodecError> {
        let envelope: Envelope =
            serde_json::from_str(text).map_err(CodecError::MalformedEnvelope)?;
        Ok(self.classify(envelope))
    }

    fn classify(&self, envelope: Envelope) -> DecodedFrame {
        let Some(kind) = EventKind::from_pipeline_type(&envelope.event_type) else {
            return DecodedFrame::Ignored {
                event_type: envelope.event_type,
                reason: IgnoreReason::UnknownType,
            };
        };

        let Some(content) = envelope.content.as_deref() else {
            return DecodedFrame::Ignored {
                event_type: envelope.event_type,
                reason: IgnoreReason::MissingContent,
            };
        };

        let event = match kind {
            EventKind::Online => serde_json::from_str::<FriendOnline>(content)
                .map(FriendEvent::Online),
            EventKind::Offline => serde_json::from_str::<FriendOffline>(content)
                .map(FriendEvent::Offline),
            EventKind::LocationChanged => serde_json::from_str::<FriendLocation>(content)
                .map(FriendEvent::LocationChanged),
            EventKind::ProfileUpdated => serde_json::from_str::<FriendUpdate>(content)
                .map(FriendEvent::ProfileUpdated),
        };

        match event {
            Ok(event) => DecodedFrame::Event(event),
            Err(error) => {
                tracing::debug!(
                    event_type = %envelope.event_type,
                    %error,
                    "Dropping frame with malformed content"
                );
                DecodedFrame::Ignored {
                    event_type: envelope.event_type,
                    reason: IgnoreReason::MalformedContent,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(event_type: &str, content: &str) -> String {
        serde_json::to_string(&Envelope {
            event_type: event_type.to_string(),
            content: Some(content.to_string()),
        })
        .unwrap()
    }

    #[test]
    fn decodes_online_event() {
        let codec = EnvelopeCodec::new();
        let text = frame(
            "friend-online",
            r#"{"userId":"usr_1","user":{"id":"usr_1","displayName":"willow","status":"active"},"location":"wrld_a:1"}"#,
        );

        match codec.decode(&text).unwrap() {
            DecodedFrame::Event(FriendEvent::Online(payload)) => {
                assert_eq!(payload.user_id, "usr_1");
                assert_eq!(payload.user.display_name, "willow");
                assert_eq!(payload.location.as_deref(), Some("wrld_a:1"));
            }
            other => panic!("expected online event, got {other:?}"),
        }
    }

    #[test]
    fn friend_active_classifies_as_online() {
        let codec = EnvelopeCodec::new();
        let text = frame(
            "friend-active",
            r#"{"userId":"usr_2","user":{"id":"usr_2","displayName":"ash"}}"#,
        );

        assert!(matches!(
            codec.decode(&text).unwrap(),
            DecodedFrame::Event(FriendEvent::Online(_))
        ));
    }

    #[test]
    fn unknown_type_is_ignored_not_error() {
        let codec = EnvelopeCodec::new();
        let text = frame("notification", r#"{"id":"not_1"}"#);

        assert!(matches!(
            codec.decode(&text).unwrap(),
            DecodedFrame::Ignored {
                reason: IgnoreReason::UnknownType,
                ..
            }
        ));
    }

    #[test]
    fn malformed_content_is_ignored_not_error() {
        let codec = EnvelopeCodec::new();
        let text = frame("friend-offline", "not json at all");

        assert!(matches!(
            codec.decode(&text).unwrap(),
            DecodedFrame::Ignored {
                reason: IgnoreReason::MalformedContent,
                ..
            }
        ));
    }

    #[test]
    fn missing_content_is_ignored() {
        let codec = EnvelopeCodec::new();

        assert!(matches!(
            codec.decode(r#"{"type":"friend-offline"}"#).unwrap(),
            DecodedFrame::Ignored {
                reason: IgnoreReason::MissingContent,
                ..
            }
        ));
    }

    #[test]
    fn malformed_envelope_is_error() {
        let codec = EnvelopeCodec::new();
        assert!(codec.decode("{{{").is_err());
    }
}
