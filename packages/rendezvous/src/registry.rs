use std::borrow::Borrow;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use uuid::Uuid;

use crate::channel::Channel;

/// Single-use rendezvous token handed to a waiting peer.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct Token(String);

impl Token {
    /// Random v4 UUID: 122 bits from the OS CSPRNG.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for Token {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<String> for Token {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Token {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Tokens of channels waiting to be paired.
///
/// Not synchronized on its own; [`Switchboard`](crate::Switchboard) holds it
/// under the same lock as the pairing table.
#[derive(Default)]
pub struct Registry {
    waiting: HashMap<Token, Channel>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a fresh token for `channel`. Never returns a token that is
    /// currently live.
    pub fn issue(&mut self, channel: &Channel) -> Token {
        loop {
            let token = Token::generate();
            if let Entry::Vacant(slot) = self.waiting.entry(token.clone()) {
                slot.insert(channel.clone());
                return token;
            }
        }
    }

    /// Remove and return the channel waiting on `token`. A token can be
    /// consumed once.
    pub fn consume(&mut self, token: &str) -> Option<Channel> {
        self.waiting.remove(token)
    }

    pub fn owner_of(&self, token: &str) -> Option<&Channel> {
        self.waiting.get(token)
    }

    pub fn contains(&self, token: &str) -> bool {
        self.waiting.contains_key(token)
    }

    /// Drop every token owned by `channel`. Returns how many were removed.
    pub fn evict(&mut self, channel: &Channel) -> usize {
        let before = self.waiting.len();
        self.waiting.retain(|_, owner| owner != channel);
        before - self.waiting.len()
    }

    pub fn len(&self) -> usize {
        self.waiting.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiting.is_empty()
    }
}
