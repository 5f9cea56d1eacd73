//! Server metrics for observability
//!
//! Provides runtime counters for monitoring relay health and traffic.

use rendezvous::{SessionObserver, SignalError};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Server-wide metrics
#[derive(Debug, Default)]
pub struct ServerMetrics {
    // Connection metrics
    /// Currently open WebSocket connections
    pub active_connections: AtomicU64,
    /// Total connections since server start
    pub total_connections: AtomicU64,

    // Pairing metrics
    /// Tokens issued
    pub registrations: AtomicU64,
    /// Successful pairings
    pub pairings: AtomicU64,

    // Message metrics
    /// Frames received from clients
    pub messages_received: AtomicU64,
    /// Offers/answers/candidates delivered to a peer
    pub messages_relayed: AtomicU64,

    // Error metrics
    /// Error replies sent for malformed or invalid requests
    pub protocol_errors: AtomicU64,
    /// Sends that failed because the transport was gone
    pub send_failures: AtomicU64,

    /// Server start time (for uptime calculation)
    start_time: Option<Instant>,
}

impl ServerMetrics {
    pub fn new() -> Self {
        Self {
            start_time: Some(Instant::now()),
            ..Default::default()
        }
    }

    // Connection tracking
    pub fn connection_opened(&self) {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
        self.total_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.map(|t| t.elapsed().as_secs()).unwrap_or(0)
    }

    /// Create a snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_secs: self.uptime_secs(),
            connections: ConnectionMetrics {
                active: self.active_connections.load(Ordering::Relaxed),
                total: self.total_connections.load(Ordering::Relaxed),
            },
            signaling: SignalingMetrics {
                registrations: self.registrations.load(Ordering::Relaxed),
                pairings: self.pairings.load(Ordering::Relaxed),
                messages_received: self.messages_received.load(Ordering::Relaxed),
                messages_relayed: self.messages_relayed.load(Ordering::Relaxed),
            },
            errors: ErrorMetrics {
                protocol: self.protocol_errors.load(Ordering::Relaxed),
                send_failures: self.send_failures.load(Ordering::Relaxed),
            },
        }
    }
}

impl SessionObserver for ServerMetrics {
    fn message_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    fn registered(&self) {
        self.registrations.fetch_add(1, Ordering::Relaxed);
    }

    fn paired(&self) {
        self.pairings.fetch_add(1, Ordering::Relaxed);
    }

    fn relayed(&self) {
        self.messages_relayed.fetch_add(1, Ordering::Relaxed);
    }

    fn protocol_error(&self, _error: &SignalError) {
        self.protocol_errors.fetch_add(1, Ordering::Relaxed);
    }

    fn send_failed(&self) {
        self.send_failures.fetch_add(1, Ordering::Relaxed);
    }
}

/// Serializable snapshot of metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub connections: ConnectionMetrics,
    pub signaling: SignalingMetrics,
    pub errors: ErrorMetrics,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionMetrics {
    pub active: u64,
    pub total: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalingMetrics {
    pub registrations: u64,
    pub pairings: u64,
    pub messages_received: u64,
    pub messages_relayed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorMetrics {
    pub protocol: u64,
    pub send_failures: u64,
}

/// Health status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub connections: u64,
    /// Peers holding a token, waiting for someone to connect
    pub waiting: usize,
    pub pairs: usize,
    pub uptime_secs: u64,
}
