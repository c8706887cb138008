//! Wire-level message envelope exchanged between clients and the hub.
//!
//! Every frame in either direction is a JSON object with a `type` tag,
//! a sender, an optional target, and an opaque payload. The hub routes
//! on the tag and never looks inside the payload.

use serde::{Deserialize, Serialize};

/// Message-type discriminator.
///
/// Tags appear in kebab-case on the wire (`"broadcast-news"`). A tag the
/// gateway does not recognize decodes to [`MessageKind::Unknown`] so the
/// hub can reject it explicitly instead of the decoder swallowing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MessageKind {
    /// Free-form chat message, fanned out to every registered client.
    Chat,
    /// Synthesized by the hub when a client registers.
    Join,
    /// Synthesized by the hub when a client unregisters.
    Leave,
    /// Direct message for a single target client.
    Private,
    /// Application-level liveness probe; logged, never fanned out.
    Ping,
    /// Server-originated bulletin, fanned out to every registered client.
    BroadcastNews,
    /// Any tag this gateway does not understand.
    #[serde(other)]
    Unknown,
}

/// Envelope for every JSON frame exchanged with a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Message-type discriminator (wire field `type`).
    #[serde(rename = "type")]
    pub kind: MessageKind,
    /// Identity of the originating client. Required; a frame without it
    /// is a decode error.
    pub sender_id: String,
    /// Recipient identity; only meaningful for [`MessageKind::Private`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
    /// Opaque application payload; the hub never interprets it.
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Message {
    /// Builds a server-synthesized message with no target.
    #[must_use]
    pub fn system(
        kind: MessageKind,
        sender_id: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            kind,
            sender_id: sender_id.into(),
            target_id: None,
            payload,
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn tags_are_kebab_case() {
        let Ok(tag) = serde_json::to_string(&MessageKind::BroadcastNews) else {
            panic!("tag must serialize");
        };
        assert_eq!(tag, "\"broadcast-news\"");

        let Ok(tag) = serde_json::to_string(&MessageKind::Chat) else {
            panic!("tag must serialize");
        };
        assert_eq!(tag, "\"chat\"");
    }

    #[test]
    fn unrecognized_tag_decodes_to_unknown() {
        let frame = r#"{"type":"teleport","sender_id":"u1","payload":{}}"#;
        let Ok(message) = serde_json::from_str::<Message>(frame) else {
            panic!("frame with a foreign tag must still decode");
        };
        assert_eq!(message.kind, MessageKind::Unknown);
        assert_eq!(message.sender_id, "u1");
    }

    #[test]
    fn target_and_payload_are_optional() {
        let frame = r#"{"type":"chat","sender_id":"u1"}"#;
        let Ok(message) = serde_json::from_str::<Message>(frame) else {
            panic!("minimal chat frame must decode");
        };
        assert_eq!(message.target_id, None);
        assert_eq!(message.payload, serde_json::Value::Null);
    }

    #[test]
    fn absent_target_is_omitted_on_serialize() {
        let message = Message::system(MessageKind::Leave, "u1", serde_json::Value::Null);
        let Ok(json) = serde_json::to_string(&message) else {
            panic!("message must serialize");
        };
        assert!(!json.contains("target_id"));
        assert!(json.contains("\"type\":\"leave\""));
    }

    #[test]
    fn missing_sender_is_a_decode_error() {
        let frame = r#"{"type":"chat","payload":{"content":"hi"}}"#;
        assert!(serde_json::from_str::<Message>(frame).is_err());
    }

    #[test]
    fn private_round_trips_with_target() {
        let message = Message {
            kind: MessageKind::Private,
            sender_id: "u1".to_string(),
            target_id: Some("u2".to_string()),
            payload: serde_json::json!({"content": "psst"}),
        };
        let Ok(json) = serde_json::to_string(&message) else {
            panic!("message must serialize");
        };
        let Ok(decoded) = serde_json::from_str::<Message>(&json) else {
            panic!("message must decode");
        };
        assert_eq!(decoded.kind, MessageKind::Private);
        assert_eq!(decoded.target_id.as_deref(), Some("u2"));
    }
}
