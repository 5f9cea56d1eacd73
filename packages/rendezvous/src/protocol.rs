//! Wire Protocol Types
//!
//! One JSON envelope is used in both directions:
//!
//! ```json
//! {"type": "offer", "id": "...", "error": "...", "payload": {...}}
//! ```
//!
//! `payload` is kept as raw JSON text and written back out unchanged, so the
//! server never reinterprets SDP or ICE data it relays.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::value::RawValue;

use crate::error::SignalError;
use crate::registry::Token;

/// Value of the `type` field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    /// Client asks for a rendezvous token
    Register,
    /// Server hands out the token (`id`)
    Registered,
    /// Client joins the peer waiting on `id`
    Connect,
    /// Server confirms the pairing to both peers
    Connected,
    Offer,
    Answer,
    Candidate,
    /// Client leaves its pairing
    Disconnect,
    /// Server tells a peer its partner is gone
    Disconnected,
    Error,
    /// Anything else, including a missing `type`; answered with
    /// `unknown message type`
    #[serde(other)]
    #[default]
    Unknown,
}

impl MessageType {
    /// Types whose payload is relayed verbatim to the paired peer.
    pub fn is_relayed(self) -> bool {
        matches!(self, Self::Offer | Self::Answer | Self::Candidate)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalMessage {
    #[serde(rename = "type", default)]
    pub kind: MessageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// A present `null` is kept as raw `null`, only an absent field is `None`.
    #[serde(
        default,
        deserialize_with = "present_payload",
        skip_serializing_if = "Option::is_none"
    )]
    pub payload: Option<Box<RawValue>>,
}

fn present_payload<'de, D>(deserializer: D) -> Result<Option<Box<RawValue>>, D::Error>
where
    D: Deserializer<'de>,
{
    Box::<RawValue>::deserialize(deserializer).map(Some)
}

impl SignalMessage {
    fn bare(kind: MessageType) -> Self {
        Self {
            kind,
            id: None,
            error: None,
            payload: None,
        }
    }

    /// Parse one inbound text frame. Extra fields are ignored.
    pub fn parse(text: &str) -> Result<Self, SignalError> {
        serde_json::from_str(text).map_err(|_| SignalError::InvalidInput)
    }

    pub fn registered(token: &Token) -> Self {
        Self {
            id: Some(token.as_str().to_string()),
            ..Self::bare(MessageType::Registered)
        }
    }

    pub fn connected() -> Self {
        Self::bare(MessageType::Connected)
    }

    pub fn disconnected() -> Self {
        Self::bare(MessageType::Disconnected)
    }

    pub fn error(error: &SignalError) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::bare(MessageType::Error)
        }
    }

    /// Build the message forwarded to a peer: same type, same payload bytes,
    /// nothing else carried over.
    pub fn relay(kind: MessageType, payload: Option<Box<RawValue>>) -> Self {
        Self {
            payload,
            ..Self::bare(kind)
        }
    }
}
