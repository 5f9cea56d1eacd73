use thiserror::Error;

use crate::channel::ChannelId;

/// Protocol errors reported back to the offending connection.
///
/// The `Display` text is what goes out in the `error` field of the wire
/// message, so these strings are part of the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SignalError {
    #[error("invalid JSON")]
    InvalidInput,

    #[error("missing id")]
    MissingId,

    #[error("invalid ID")]
    InvalidId,

    #[error("cannot connect to own ID")]
    SelfConnect,

    #[error("already connected to a peer")]
    AlreadyPaired,

    #[error("not connected to a peer")]
    NotPaired,

    #[error("unknown message type")]
    UnknownType,
}

/// Failure to deliver a message on a [`Channel`](crate::Channel).
///
/// Never retried: the channel is treated as dead.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("transport closed: {0}")]
    Transport(String),

    #[error("channel closed after an earlier send failed")]
    Closed,

    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Precondition violations on [`PairingTable::link`](crate::PairingTable::link).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PairingError {
    #[error("{0} is already paired")]
    AlreadyPaired(ChannelId),

    #[error("{0} cannot be paired with itself")]
    SelfPairing(ChannelId),
}
