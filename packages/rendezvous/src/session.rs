//! Signaling Session
//!
//! Per-connection message loop. States are implicit in the switchboard:
//! unregistered, waiting (holds a token), paired, and finally detached.

use futures::{Stream, StreamExt};
use std::fmt;
use std::pin::pin;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::channel::{Channel, ChannelId};
use crate::error::{SendError, SignalError};
use crate::protocol::{MessageType, SignalMessage};
use crate::switchboard::Switchboard;

/// One frame read from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Text(String),
    /// Binary frames are not part of the protocol and get an `error` reply
    Binary(Vec<u8>),
    /// Orderly close from the peer
    Close,
}

#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    /// Close the transport after an explicit `disconnect` instead of letting
    /// the client register again on the same connection.
    pub close_on_disconnect: bool,
}

/// Hooks for counting session activity. All methods default to no-ops.
pub trait SessionObserver: Send + Sync {
    fn message_received(&self) {}
    fn registered(&self) {}
    fn paired(&self) {}
    fn relayed(&self) {}
    fn protocol_error(&self, _error: &SignalError) {}
    fn send_failed(&self) {}
}

pub struct NoopObserver;

impl SessionObserver for NoopObserver {}

enum Flow {
    Continue,
    Close,
}

pub struct Session {
    channel: Channel,
    switchboard: Arc<Switchboard>,
    config: SessionConfig,
    observer: Arc<dyn SessionObserver>,
}

impl Session {
    pub fn new(channel: Channel, switchboard: Arc<Switchboard>) -> Self {
        Self {
            channel,
            switchboard,
            config: SessionConfig::default(),
            observer: Arc::new(NoopObserver),
        }
    }

    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Drive the session until the inbound stream ends, fails, or the
    /// session decides to close. Shared state is released on every exit
    /// path, including when this future is dropped mid-flight.
    pub async fn run<S, E>(self, inbound: S)
    where
        S: Stream<Item = Result<Inbound, E>>,
        E: fmt::Display,
    {
        let conn_id = self.channel.id();
        let guard = TeardownGuard {
            channel: Some(self.channel.clone()),
            switchboard: self.switchboard.clone(),
        };
        let mut inbound = pin!(inbound);

        debug!(conn_id = %conn_id, "Session started");

        let mut close_transport = false;
        loop {
            let flow = match inbound.next().await {
                Some(Ok(Inbound::Text(text))) => self.handle_text(&text).await,
                Some(Ok(Inbound::Binary(data))) => self.handle_binary(&data).await,
                Some(Ok(Inbound::Close)) | None => {
                    debug!(conn_id = %conn_id, "Transport closed by peer");
                    break;
                }
                Some(Err(e)) => {
                    debug!(conn_id = %conn_id, "Read error: {}", e);
                    break;
                }
            };

            if let Flow::Close = flow {
                close_transport = true;
                break;
            }
        }

        teardown(&self.switchboard, &self.channel).await;
        guard.disarm();

        if close_transport {
            let _ = self.channel.close().await;
        }
        debug!(conn_id = %conn_id, "Session ended");
    }

    async fn handle_binary(&self, data: &[u8]) -> Flow {
        self.observer.message_received();
        debug!(conn_id = %self.channel.id(), "Rejected binary frame ({} bytes)", data.len());
        self.reject(SignalError::InvalidInput).await
    }

    async fn handle_text(&self, text: &str) -> Flow {
        self.observer.message_received();

        let message = match SignalMessage::parse(text) {
            Ok(message) => message,
            Err(e) => {
                debug!(conn_id = %self.channel.id(), "Invalid message ({} bytes)", text.len());
                return self.reject(e).await;
            }
        };

        match message.kind {
            MessageType::Register => self.on_register().await,
            MessageType::Connect => self.on_connect(message.id.as_deref().unwrap_or("")).await,
            kind if kind.is_relayed() => self.on_relay(message).await,
            MessageType::Disconnect => self.on_disconnect().await,
            _ => self.reject(SignalError::UnknownType).await,
        }
    }

    async fn on_register(&self) -> Flow {
        match self.switchboard.register(&self.channel).await {
            Ok(token) => {
                self.observer.registered();
                info!(conn_id = %self.channel.id(), "Registered, waiting for peer");
                self.reply(&SignalMessage::registered(&token)).await
            }
            Err(e) => self.reject(e).await,
        }
    }

    async fn on_connect(&self, token: &str) -> Flow {
        // Our own send slot is taken before the pairing becomes visible, so a
        // `disconnected` from a partner that leaves right away lands after
        // our `connected`.
        let slot = self.channel.reserve().await;
        let target = match self.switchboard.connect(&self.channel, token).await {
            Ok(target) => target,
            Err(e) => {
                drop(slot);
                return self.reject(e).await;
            }
        };

        self.observer.paired();
        info!(conn_id = %self.channel.id(), peer = %target.id(), "Two peers connected");

        let connected = SignalMessage::connected();
        let flow = self.settle(slot.send(&connected).await);
        if let Err(e) = target.send(&connected).await {
            self.observer.send_failed();
            debug!(conn_id = %self.channel.id(), peer = %target.id(), "Failed to notify peer: {}", e);
        }
        flow
    }

    async fn on_relay(&self, message: SignalMessage) -> Flow {
        let Some(peer) = self.switchboard.peer_of(&self.channel).await else {
            return self.reject(SignalError::NotPaired).await;
        };

        let forwarded = SignalMessage::relay(message.kind, message.payload);
        match peer.send(&forwarded).await {
            Ok(()) => self.observer.relayed(),
            Err(e) => {
                // The peer's own loop will tear its side down.
                self.observer.send_failed();
                debug!(conn_id = %self.channel.id(), peer = %peer.id(), "Forward failed: {}", e);
            }
        }
        Flow::Continue
    }

    async fn on_disconnect(&self) -> Flow {
        teardown(&self.switchboard, &self.channel).await;
        if self.config.close_on_disconnect {
            Flow::Close
        } else {
            Flow::Continue
        }
    }

    async fn reject(&self, error: SignalError) -> Flow {
        self.observer.protocol_error(&error);
        self.reply(&SignalMessage::error(&error)).await
    }

    /// Send to our own peer. A failure here means the connection is gone.
    async fn reply(&self, message: &SignalMessage) -> Flow {
        self.settle(self.channel.send(message).await)
    }

    fn settle(&self, sent: Result<(), SendError>) -> Flow {
        match sent {
            Ok(()) => Flow::Continue,
            Err(e) => {
                self.observer.send_failed();
                debug!(conn_id = %self.channel.id(), "Send failed, closing session: {}", e);
                Flow::Close
            }
        }
    }
}

/// Remove `channel` from the switchboard and tell its former partner, if
/// any. Delivery to the partner is best effort. Returns the partner's id.
pub async fn teardown(switchboard: &Switchboard, channel: &Channel) -> Option<ChannelId> {
    let partner = switchboard.detach(channel).await?;
    info!(conn_id = %channel.id(), peer = %partner.id(), "Pairing dissolved");
    if let Err(e) = partner.send(&SignalMessage::disconnected()).await {
        debug!(peer = %partner.id(), "Failed to notify peer of disconnect: {}", e);
    }
    Some(partner.id())
}

/// Runs teardown on a fresh task if the session future is dropped before
/// reaching its own teardown (panic, server shutdown).
struct TeardownGuard {
    channel: Option<Channel>,
    switchboard: Arc<Switchboard>,
}

impl TeardownGuard {
    fn disarm(mut self) {
        self.channel = None;
    }
}

impl Drop for TeardownGuard {
    fn drop(&mut self) {
        let Some(channel) = self.channel.take() else {
            return;
        };
        let switchboard = self.switchboard.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    teardown(&switchboard, &channel).await;
                });
            }
            Err(_) => {
                warn!(conn_id = %channel.id(), "No runtime for teardown, shared state not released");
            }
        }
    }
}
