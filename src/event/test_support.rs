//! Deterministic event fixtures for unit tests.

use std::collections::BTreeSet;

use nostr::{EventId, Keys, Kind, PublicKey, Timestamp};

use super::types::Event;
use crate::relay::RelayUrl;

/// Base creation time for fixtures.
pub const BASE_TIME: u64 = 1_700_000_000;

/// Deterministic event id for `n`.
pub fn event_id(n: u64) -> EventId {
    EventId::from_hex(&format!("{n:064x}")).expect("fixture id is valid hex")
}

/// Deterministic public key for `n` (must be non-zero).
pub fn pubkey(n: u64) -> PublicKey {
    Keys::parse(&format!("{n:064x}"))
        .expect("fixture secret key is valid")
        .public_key()
}

/// Builder for fixture events.
pub struct EventFixture {
    id: u64,
    author: u64,
    kind: u16,
    created_at: u64,
    tags: Vec<Vec<String>>,
    content: String,
    seen_on: BTreeSet<RelayUrl>,
}

impl EventFixture {
    /// Starts a kind 1 note with id `n`, authored by key 1, created at `BASE_TIME + n`.
    pub fn new(id: u64) -> Self {
        Self {
            id,
            author: 1,
            kind: 1,
            created_at: BASE_TIME + id,
            tags: Vec::new(),
            content: format!("note {id}"),
            seen_on: BTreeSet::new(),
        }
    }

    pub const fn kind(mut self, kind: u16) -> Self {
        self.kind = kind;
        self
    }

    pub const fn author(mut self, author: u64) -> Self {
        self.author = author;
        self
    }

    pub const fn created_at(mut self, created_at: u64) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn content(mut self, content: &str) -> Self {
        self.content = content.to_string();
        self
    }

    pub fn tag(mut self, tag: &[&str]) -> Self {
        self.tags.push(tag.iter().map(ToString::to_string).collect());
        self
    }

    /// Adds marked root and reply tags.
    pub fn reply_to(self, root: u64, parent: u64) -> Self {
        let root_hex = event_id(root).to_hex();
        let parent_hex = event_id(parent).to_hex();
        self.tag(&["e", &root_hex, "", "root"])
            .tag(&["e", &parent_hex, "", "reply"])
    }

    pub fn seen_on(mut self, relay: &str) -> Self {
        self.seen_on
            .insert(RelayUrl::parse(relay).expect("fixture relay is valid"));
        self
    }

    pub fn build(self) -> Event {
        Event {
            id: event_id(self.id),
            pubkey: pubkey(self.author),
            created_at: Timestamp::from(self.created_at),
            kind: Kind::from(self.kind),
            tags: self.tags,
            content: self.content,
            seen_on: self.seen_on,
        }
    }
}
