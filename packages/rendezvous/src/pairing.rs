use std::collections::HashMap;

use crate::channel::{Channel, ChannelId};
use crate::error::PairingError;

/// Symmetric pairing relation. Every entry `a -> b` has a matching `b -> a`.
///
/// Like [`Registry`](crate::Registry), synchronization comes from the
/// enclosing [`Switchboard`](crate::Switchboard).
#[derive(Default)]
pub struct PairingTable {
    peers: HashMap<ChannelId, Channel>,
}

impl PairingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pair `a` with `b`. Both must currently be unpaired and distinct;
    /// otherwise the table is left untouched.
    pub fn link(&mut self, a: &Channel, b: &Channel) -> Result<(), PairingError> {
        if a == b {
            return Err(PairingError::SelfPairing(a.id()));
        }
        for side in [a, b] {
            if self.peers.contains_key(&side.id()) {
                return Err(PairingError::AlreadyPaired(side.id()));
            }
        }
        self.peers.insert(a.id(), b.clone());
        self.peers.insert(b.id(), a.clone());
        Ok(())
    }

    pub fn peer_of(&self, channel: &Channel) -> Option<Channel> {
        self.peers.get(&channel.id()).cloned()
    }

    pub fn is_paired(&self, channel: &Channel) -> bool {
        self.peers.contains_key(&channel.id())
    }

    /// Remove both directions of `channel`'s pairing and return the former
    /// partner. No-op on an unpaired channel.
    pub fn unlink(&mut self, channel: &Channel) -> Option<Channel> {
        let partner = self.peers.remove(&channel.id())?;
        self.peers.remove(&partner.id());
        Some(partner)
    }

    /// Number of live pairs.
    pub fn len(&self) -> usize {
        self.peers.len() / 2
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}
