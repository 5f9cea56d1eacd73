use futures::{Sink, SinkExt};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll, ready};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::SendError;
use crate::protocol::SignalMessage;

/// Process-unique identity of a connection. Used for lookups and log
/// correlation, never sent to peers.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct ChannelId(u64);

impl ChannelId {
    fn next() -> Self {
        Self(NEXT_CHANNEL_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[cfg(test)]
    pub(crate) fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ch-{}", self.0)
    }
}

static NEXT_CHANNEL_ID: AtomicU64 = AtomicU64::new(1);

type BoxedSink = Pin<Box<dyn Sink<String, Error = SendError> + Send>>;

/// Adapts a transport sink to `SendError`.
///
/// The first failure latches: every later call returns [`SendError::Closed`]
/// without touching the transport again.
struct TransportSink<S> {
    inner: Pin<Box<S>>,
    failed: bool,
}

impl<S> TransportSink<S>
where
    S: Sink<String>,
    S::Error: fmt::Display,
{
    fn settle(&mut self, result: Result<(), S::Error>) -> Result<(), SendError> {
        result.map_err(|e| {
            self.failed = true;
            SendError::Transport(e.to_string())
        })
    }
}

impl<S> Sink<String> for TransportSink<S>
where
    S: Sink<String>,
    S::Error: fmt::Display,
{
    type Error = SendError;

    fn poll_ready(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), SendError>> {
        let this = self.get_mut();
        if this.failed {
            return Poll::Ready(Err(SendError::Closed));
        }
        let result = ready!(this.inner.as_mut().poll_ready(cx));
        Poll::Ready(this.settle(result))
    }

    fn start_send(self: Pin<&mut Self>, item: String) -> Result<(), SendError> {
        let this = self.get_mut();
        if this.failed {
            return Err(SendError::Closed);
        }
        let result = this.inner.as_mut().start_send(item);
        this.settle(result)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), SendError>> {
        let this = self.get_mut();
        if this.failed {
            return Poll::Ready(Err(SendError::Closed));
        }
        let result = ready!(this.inner.as_mut().poll_flush(cx));
        Poll::Ready(this.settle(result))
    }

    fn poll_close(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), SendError>> {
        let this = self.get_mut();
        if this.failed {
            return Poll::Ready(Err(SendError::Closed));
        }
        let result = ready!(this.inner.as_mut().poll_close(cx));
        Poll::Ready(this.settle(result))
    }
}

/// Outbound half of one peer connection.
///
/// Cloning is cheap and every clone refers to the same connection. Sends are
/// serialized through a mutex, so two tasks relaying to the same peer never
/// interleave frames; sends on different channels never wait on each other.
#[derive(Clone)]
pub struct Channel {
    id: ChannelId,
    sink: Arc<Mutex<BoxedSink>>,
}

impl Channel {
    /// Wrap any sink of text frames. The transport adapts its own frame type
    /// (e.g. a WebSocket split sink) before handing it over.
    pub fn new<S>(sink: S) -> Self
    where
        S: Sink<String> + Send + 'static,
        S::Error: fmt::Display,
    {
        let sink = TransportSink {
            inner: Box::pin(sink),
            failed: false,
        };
        Self {
            id: ChannelId::next(),
            sink: Arc::new(Mutex::new(Box::pin(sink))),
        }
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    /// Encode and deliver one message. Returns once the transport accepted
    /// the frame or failed.
    pub async fn send(&self, message: &SignalMessage) -> Result<(), SendError> {
        let text = serde_json::to_string(message)?;
        self.send_text(text).await
    }

    pub async fn send_text(&self, text: String) -> Result<(), SendError> {
        let mut sink = self.sink.lock().await;
        sink.send(text).await
    }

    /// Take the send lock now and keep it until the returned slot is used.
    /// Frames sent by other tasks in the meantime queue up behind it.
    pub async fn reserve(&self) -> SendSlot {
        SendSlot {
            sink: self.sink.clone().lock_owned().await,
        }
    }

    /// Close the outbound side of the transport.
    pub async fn close(&self) -> Result<(), SendError> {
        let mut sink = self.sink.lock().await;
        sink.close().await
    }
}

/// Exclusive right to send the next frame on a [`Channel`].
pub struct SendSlot {
    sink: OwnedMutexGuard<BoxedSink>,
}

impl SendSlot {
    pub async fn send(mut self, message: &SignalMessage) -> Result<(), SendError> {
        let text = serde_json::to_string(message)?;
        self.sink.send(text).await
    }
}

impl PartialEq for Channel {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Channel {}

impl Hash for Channel {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Channel").field(&self.id).finish()
    }
}
