//! Switchboard
//!
//! Process-wide pairing state shared by every connection. The registry and
//! the pairing table live under one mutex so that compound transitions
//! (consume + link, evict + unlink) are observed atomically. The lock is
//! never held while sending.

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use crate::channel::Channel;
use crate::error::SignalError;
use crate::pairing::PairingTable;
use crate::registry::{Registry, Token};

#[derive(Default)]
struct Tables {
    registry: Registry,
    pairings: PairingTable,
}

/// Counts for health reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchboardStats {
    /// Live rendezvous tokens
    pub waiting: usize,
    /// Live pairings
    pub pairs: usize,
}

#[derive(Default)]
pub struct Switchboard {
    tables: Mutex<Tables>,
}

impl Switchboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a token for `channel`. A paired channel may not register.
    pub async fn register(&self, channel: &Channel) -> Result<Token, SignalError> {
        let mut tables = self.tables.lock().await;
        if tables.pairings.is_paired(channel) {
            return Err(SignalError::AlreadyPaired);
        }
        Ok(tables.registry.issue(channel))
    }

    /// Consume `token` and pair `channel` with the peer waiting on it.
    ///
    /// On success both sides lose any other tokens they still held and the
    /// waiting peer is returned. On failure nothing changes.
    pub async fn connect(&self, channel: &Channel, token: &str) -> Result<Channel, SignalError> {
        if token.is_empty() {
            return Err(SignalError::MissingId);
        }

        let mut tables = self.tables.lock().await;
        if tables.pairings.is_paired(channel) {
            return Err(SignalError::AlreadyPaired);
        }
        match tables.registry.owner_of(token) {
            None => return Err(SignalError::InvalidId),
            Some(owner) if owner == channel => return Err(SignalError::SelfConnect),
            Some(owner) if tables.pairings.is_paired(owner) => return Err(SignalError::InvalidId),
            Some(_) => {}
        }

        let target = tables
            .registry
            .consume(token)
            .ok_or(SignalError::InvalidId)?;
        tables
            .pairings
            .link(channel, &target)
            .map_err(|_| SignalError::InvalidId)?;

        let stale = tables.registry.evict(channel) + tables.registry.evict(&target);
        if stale > 0 {
            debug!(
                conn_id = %channel.id(),
                peer = %target.id(),
                "Dropped {} leftover tokens after pairing", stale
            );
        }
        Ok(target)
    }

    pub async fn peer_of(&self, channel: &Channel) -> Option<Channel> {
        self.tables.lock().await.pairings.peer_of(channel)
    }

    /// Remove `channel` from all shared state and return its former partner.
    /// Safe to call any number of times.
    pub async fn detach(&self, channel: &Channel) -> Option<Channel> {
        let mut tables = self.tables.lock().await;
        tables.registry.evict(channel);
        tables.pairings.unlink(channel)
    }

    pub async fn is_waiting(&self, token: &str) -> bool {
        self.tables.lock().await.registry.contains(token)
    }

    pub async fn stats(&self) -> SwitchboardStats {
        let tables = self.tables.lock().await;
        SwitchboardStats {
            waiting: tables.registry.len(),
            pairs: tables.pairings.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::channel::mpsc;
    use std::sync::Arc;

    fn channel() -> Channel {
        let (tx, _rx) = mpsc::unbounded::<String>();
        Channel::new(tx)
    }

    #[tokio::test]
    async fn connect_pairs_and_consumes_token() {
        let board = Switchboard::new();
        let (x, y) = (channel(), channel());
        let token = board.register(&x).await.unwrap();

        let target = board.connect(&y, token.as_str()).await.unwrap();
        assert_eq!(target, x);
        assert_eq!(board.peer_of(&x).await, Some(y.clone()));
        assert_eq!(board.peer_of(&y).await, Some(x.clone()));
        assert!(!board.is_waiting(token.as_str()).await);

        let z = channel();
        assert_eq!(
            board.connect(&z, token.as_str()).await,
            Err(SignalError::InvalidId)
        );
    }

    #[tokio::test]
    async fn failed_connect_leaves_state_unchanged() {
        let board = Switchboard::new();
        let (x, z) = (channel(), channel());
        let token = board.register(&x).await.unwrap();
        let before = board.stats().await;

        assert_eq!(board.connect(&z, "").await, Err(SignalError::MissingId));
        assert_eq!(
            board.connect(&z, "nonexistent").await,
            Err(SignalError::InvalidId)
        );
        assert_eq!(
            board.connect(&x, token.as_str()).await,
            Err(SignalError::SelfConnect)
        );

        assert_eq!(board.stats().await, before);
        assert!(board.is_waiting(token.as_str()).await);
        assert_eq!(board.peer_of(&z).await, None);
    }

    #[tokio::test]
    async fn paired_channel_cannot_register_or_connect() {
        let board = Switchboard::new();
        let (x, y, w) = (channel(), channel(), channel());
        let token = board.register(&x).await.unwrap();
        board.connect(&y, token.as_str()).await.unwrap();

        assert_eq!(board.register(&x).await, Err(SignalError::AlreadyPaired));

        let other = board.register(&w).await.unwrap();
        assert_eq!(
            board.connect(&y, other.as_str()).await,
            Err(SignalError::AlreadyPaired)
        );
        assert!(board.is_waiting(other.as_str()).await);
    }

    #[tokio::test]
    async fn pairing_drops_leftover_tokens() {
        let board = Switchboard::new();
        let (x, y) = (channel(), channel());
        let first = board.register(&x).await.unwrap();
        let second = board.register(&x).await.unwrap();
        let own = board.register(&y).await.unwrap();

        board.connect(&y, first.as_str()).await.unwrap();

        assert!(!board.is_waiting(second.as_str()).await);
        assert!(!board.is_waiting(own.as_str()).await);
        assert_eq!(board.stats().await, SwitchboardStats { waiting: 0, pairs: 1 });
    }

    #[tokio::test]
    async fn detach_unlinks_and_evicts() {
        let board = Switchboard::new();
        let (x, y, w) = (channel(), channel(), channel());
        let token = board.register(&x).await.unwrap();
        board.connect(&y, token.as_str()).await.unwrap();
        board.register(&w).await.unwrap();

        assert_eq!(board.detach(&y).await, Some(x.clone()));
        assert_eq!(board.peer_of(&x).await, None);
        assert_eq!(board.detach(&y).await, None);
        assert_eq!(board.detach(&x).await, None);

        assert_eq!(board.detach(&w).await, None);
        assert_eq!(board.stats().await, SwitchboardStats::default());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_connects_on_one_token_have_one_winner() {
        let board = Arc::new(Switchboard::new());
        let owner = channel();
        let token = board.register(&owner).await.unwrap();

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let board = board.clone();
            let token = token.clone();
            tasks.push(tokio::spawn(async move {
                let caller = channel();
                board.connect(&caller, token.as_str()).await.is_ok()
            }));
        }

        let mut winners = 0;
        for task in tasks {
            if task.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
        assert_eq!(board.stats().await, SwitchboardStats { waiting: 0, pairs: 1 });
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_pairings_stay_symmetric() {
        let board = Arc::new(Switchboard::new());

        let mut tasks = Vec::new();
        for _ in 0..32 {
            let board = board.clone();
            tasks.push(tokio::spawn(async move {
                let (a, b) = (channel(), channel());
                let token = board.register(&a).await.unwrap();
                board.connect(&b, token.as_str()).await.unwrap();
                (a, b)
            }));
        }

        let mut pairs = Vec::new();
        for task in tasks {
            pairs.push(task.await.unwrap());
        }
        for (a, b) in &pairs {
            assert_eq!(board.peer_of(a).await.as_ref(), Some(b));
            assert_eq!(board.peer_of(b).await.as_ref(), Some(a));
        }
        assert_eq!(board.stats().await.pairs, 32);

        let mut teardowns = Vec::new();
        for (a, _) in pairs.iter().cloned() {
            let board = board.clone();
            teardowns.push(tokio::spawn(async move { board.detach(&a).await }));
        }
        for task in teardowns {
            assert!(task.await.unwrap().is_some());
        }
        for (a, b) in &pairs {
            assert_eq!(board.peer_of(a).await, None);
            assert_eq!(board.peer_of(b).await, None);
        }
    }
}
