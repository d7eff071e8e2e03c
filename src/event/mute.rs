//! Mute rules.
//!
//! The feed assembler consults a [`MutePredicate`] before any event reaches
//! the feed, the live buffer or the parent map.

use std::collections::HashSet;

use nostr::{EventId, PublicKey};

use super::types::Event;

/// Decides whether an event or author is hidden from the user.
pub trait MutePredicate: Send + Sync {
    /// Returns true if the author is muted.
    fn is_pubkey_muted(&self, pubkey: &PublicKey) -> bool;

    /// Returns true if the event is muted.
    ///
    /// The default implementation only checks the author.
    fn is_event_muted(&self, event: &Event) -> bool {
        self.is_pubkey_muted(&event.pubkey)
    }
}

/// A predicate that mutes nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMutes;

impl MutePredicate for NoMutes {
    fn is_pubkey_muted(&self, _pubkey: &PublicKey) -> bool {
        false
    }
}

/// A user's mute list: authors, individual events and words.
#[derive(Debug, Clone, Default)]
pub struct MuteList {
    pubkeys: HashSet<PublicKey>,
    events: HashSet<EventId>,
    words: Vec<String>,
}

impl MuteList {
    /// Creates an empty mute list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mutes an author.
    #[must_use]
    pub fn with_pubkey(mut self, pubkey: PublicKey) -> Self {
        self.pubkeys.insert(pubkey);
        self
    }

    /// Mutes a single event.
    #[must_use]
    pub fn with_event(mut self, id: EventId) -> Self {
        self.events.insert(id);
        self
    }

    /// Mutes events whose content contains `word` (case-insensitive).
    #[must_use]
    pub fn with_word(mut self, word: &str) -> Self {
        let word = word.trim().to_lowercase();
        if !word.is_empty() {
            self.words.push(word);
        }
        self
    }

    /// Returns true if nothing is muted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pubkeys.is_empty() && self.events.is_empty() && self.words.is_empty()
    }
}

impl MutePredicate for MuteList {
    fn is_pubkey_muted(&self, pubkey: &PublicKey) -> bool {
        self.pubkeys.contains(pubkey)
    }

    fn is_event_muted(&self, event: &Event) -> bool {
        if self.is_pubkey_muted(&event.pubkey) || self.events.contains(&event.id) {
            return true;
        }
        if self.words.is_empty() {
            return false;
        }
        let content = event.content.to_lowercase();
        self.words.iter().any(|word| content.contains(word.as_str()))
    }
}
