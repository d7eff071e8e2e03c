//! Sources of advertised relays.
//!
//! A [`RelayDirectory`] answers "which relays does this pubkey use for
//! reading or writing", and a [`Session`] answers the same question for
//! the local user. [`RelayListStore`] implements the directory in memory
//! from relay list events.

use std::collections::HashMap;

use nostr::PublicKey;

use super::error::RelayResult;
use super::types::{RelayList, RelayMode};
use super::url::RelayUrl;
use crate::event::Event;

/// Looks up a pubkey's advertised relays.
pub trait RelayDirectory: Send + Sync {
    /// The pubkey's relays for `mode`, best first.
    fn relays_for(&self, pubkey: &PublicKey, mode: RelayMode) -> Vec<RelayUrl>;
}

/// The local user's own relays.
pub trait Session: Send + Sync {
    /// The user's relays for `mode`, best first.
    fn user_relays(&self, mode: RelayMode) -> Vec<RelayUrl>;
}

impl Session for RelayList {
    fn user_relays(&self, mode: RelayMode) -> Vec<RelayUrl> {
        self.relays(mode)
    }
}

/// A session with no configured relays (logged out).
#[derive(Debug, Clone, Copy, Default)]
pub struct AnonymousSession;

impl Session for AnonymousSession {
    fn user_relays(&self, _mode: RelayMode) -> Vec<RelayUrl> {
        Vec::new()
    }
}

/// In-memory directory built from relay list events.
///
/// Only the newest list per author is kept.
#[derive(Debug, Clone, Default)]
pub struct RelayListStore {
    lists: HashMap<PublicKey, RelayList>,
}

impl RelayListStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ingests a relay list event.
    ///
    /// Returns `true` if the event replaced the stored list for its author.
    ///
    /// # Errors
    ///
    /// Returns an error if the event is not a valid relay list.
    pub fn ingest(&mut self, event: &Event) -> RelayResult<bool> {
        let list = RelayList::from_event(event)?;
        Ok(self.insert(event.pubkey, list))
    }

    /// Stores a list for `pubkey` unless a newer one is already known.
    pub fn insert(&mut self, pubkey: PublicKey, list: RelayList) -> bool {
        match self.lists.get(&pubkey) {
            Some(existing) if existing.created_at >= list.created_at => false,
            _ => {
                self.lists.insert(pubkey, list);
                true
            }
        }
    }

    /// Returns the stored list for a pubkey.
    #[must_use]
    pub fn get(&self, pubkey: &PublicKey) -> Option<&RelayList> {
        self.lists.get(pubkey)
    }

    /// Number of authors with a known list.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lists.len()
    }

    /// Returns true if no lists are known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }
}

impl RelayDirectory for RelayListStore {
    fn relays_for(&self, pubkey: &PublicKey, mode: RelayMode) -> Vec<RelayUrl> {
        self.lists
            .get(pubkey)
            .map(|list| list.relays(mode))
            .unwrap_or_default()
    }
}
