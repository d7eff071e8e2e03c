//! Event records as seen by the routing and feed layers.

use std::collections::BTreeSet;

use nostr::{EventId, Kind, PublicKey, Timestamp};
use serde::{Deserialize, Serialize};

use super::thread::ThreadRefs;
use crate::relay::RelayUrl;

/// Kinds that react to another event rather than stand on their own.
///
/// Reactions (7) and zap receipts (9735) are threaded under their target
/// but never shown as top-level feed entries.
pub const REACTION_KINDS: &[u16] = &[7, 9735];

/// An immutable protocol event plus the relays it was observed on.
///
/// Signatures are not carried: verification happens in the transport
/// before events reach this layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Content-derived event id.
    pub id: EventId,
    /// Author public key.
    pub pubkey: PublicKey,
    /// Creation time (Unix seconds).
    pub created_at: Timestamp,
    /// Semantic kind.
    pub kind: Kind,
    /// Raw tags.
    pub tags: Vec<Vec<String>>,
    /// Event content.
    pub content: String,
    /// Relays this event was received from.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub seen_on: BTreeSet<RelayUrl>,
}

impl Event {
    /// Converts a protocol event, recording the relays it was seen on.
    #[must_use]
    pub fn from_nostr<I>(event: &nostr::Event, seen_on: I) -> Self
    where
        I: IntoIterator<Item = RelayUrl>,
    {
        Self {
            id: event.id,
            pubkey: event.pubkey,
            created_at: event.created_at,
            kind: event.kind,
            tags: event.tags.iter().map(|tag| tag.as_slice().to_vec()).collect(),
            content: event.content.clone(),
            seen_on: seen_on.into_iter().collect(),
        }
    }

    /// Returns this event with an extra relay recorded in `seen_on`.
    #[must_use]
    pub fn seen_on_relay(mut self, relay: RelayUrl) -> Self {
        self.seen_on.insert(relay);
        self
    }

    /// Thread references parsed from the `e` tags.
    #[must_use]
    pub fn thread(&self) -> ThreadRefs {
        ThreadRefs::from_tags(&self.tags)
    }

    /// The id of the event this one replies to, if any.
    #[must_use]
    pub fn parent_id(&self) -> Option<EventId> {
        self.thread().parent.map(|reference| reference.id)
    }

    /// Returns true if this event replies to another event.
    #[must_use]
    pub fn is_reply(&self) -> bool {
        self.parent_id().is_some()
    }

    /// Returns true if this event is a reaction kind.
    #[must_use]
    pub fn is_reaction(&self) -> bool {
        REACTION_KINDS.contains(&self.kind.as_u16())
    }

    /// Public keys named in `p` tags, in tag order, without duplicates.
    #[must_use]
    pub fn tagged_pubkeys(&self) -> Vec<PublicKey> {
        let mut pubkeys: Vec<PublicKey> = Vec::new();
        for tag in &self.tags {
            if tag.first().map(String::as_str) != Some("p") {
                continue;
            }
            let Some(pubkey) = tag.get(1).and_then(|hex| PublicKey::from_hex(hex).ok()) else {
                continue;
            };
            if !pubkeys.contains(&pubkey) {
                pubkeys.push(pubkey);
            }
        }
        pubkeys
    }
}

/// An event with the replies the feed assembler has attached to it.
///
/// Display events are rebuilt from the assembler's arena on every publish
/// and never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayEvent {
    /// The underlying event.
    pub event: Event,
    /// Replies, unique by id, oldest first.
    pub replies: Vec<DisplayEvent>,
}

impl DisplayEvent {
    /// Wraps an event without replies.
    #[must_use]
    pub const fn new(event: Event) -> Self {
        Self {
            event,
            replies: Vec::new(),
        }
    }

    /// The event id.
    #[must_use]
    pub const fn id(&self) -> EventId {
        self.event.id
    }

    /// Total number of descendants.
    #[must_use]
    pub fn descendant_count(&self) -> usize {
        self.replies
            .iter()
            .map(|reply| 1 + reply.descendant_count())
            .sum()
    }
}
