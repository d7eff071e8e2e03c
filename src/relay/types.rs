//! Types for relay routing.
//!
//! This module defines candidate lists, relay modes, NIP-65 relay lists and
//! the fallback policy applied after selection.

use serde::{Deserialize, Serialize};

use super::error::{RelayError, RelayResult};
use super::url::RelayUrl;
use crate::event::Event;

/// Relay list metadata kind (NIP-65).
pub const KIND_RELAY_LIST: u16 = 10002;

/// Direction a relay is used in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayMode {
    /// Relays a user reads from (their inbox).
    Read,
    /// Relays a user publishes to (their outbox).
    Write,
}

/// The source a candidate list was produced for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HintRole {
    /// An author's advertised write relays.
    AuthorWrite,
    /// An author's advertised read relays.
    AuthorRead,
    /// Relays an event was observed on.
    SeenOn,
    /// Relay hints embedded in event tags.
    TagHint,
    /// The local user's write relays.
    UserWrite,
    /// The local user's read relays.
    UserRead,
    /// Configured default relays.
    Default,
}

impl HintRole {
    /// The local user's role for `mode`.
    #[must_use]
    pub const fn user(mode: RelayMode) -> Self {
        match mode {
            RelayMode::Read => Self::UserRead,
            RelayMode::Write => Self::UserWrite,
        }
    }
}

/// An ordered, best-first list of candidate relays for one role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateList {
    /// The role this list was produced for.
    pub role: HintRole,
    /// Candidate relays, best first.
    pub urls: Vec<RelayUrl>,
}

impl CandidateList {
    /// Creates a new candidate list.
    #[must_use]
    pub const fn new(role: HintRole, urls: Vec<RelayUrl>) -> Self {
        Self { role, urls }
    }

    /// Returns true if the list has no candidates.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}

/// How many fallback relays to add after selection.
///
/// | Policy  | Fallbacks added           |
/// |---------|---------------------------|
/// | None    | 0                         |
/// | Minimal | 1 if nothing was selected |
/// | Maximal | enough to reach the limit |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackPolicy {
    /// Never add fallbacks.
    None,
    /// Add one fallback only when selection came back empty.
    #[default]
    Minimal,
    /// Fill up to the limit with fallbacks.
    Maximal,
}

impl FallbackPolicy {
    /// Number of fallbacks to add given `count` selected relays.
    #[must_use]
    pub const fn fallback_count(self, count: usize, limit: usize) -> usize {
        match self {
            Self::None => 0,
            Self::Minimal => {
                if count == 0 && limit > 0 {
                    1
                } else {
                    0
                }
            }
            Self::Maximal => limit.saturating_sub(count),
        }
    }
}

/// One entry of a relay list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayListEntry {
    /// The relay URL.
    pub url: RelayUrl,
    /// Whether the owner reads from this relay.
    pub read: bool,
    /// Whether the owner writes to this relay.
    pub write: bool,
}

impl RelayListEntry {
    /// Returns true if the entry is used in the given mode.
    #[must_use]
    pub const fn supports(&self, mode: RelayMode) -> bool {
        match mode {
            RelayMode::Read => self.read,
            RelayMode::Write => self.write,
        }
    }
}

/// A user's advertised relays (NIP-65, kind 10002).
///
/// Each `r` tag names a relay with an optional `read` or `write` marker; an
/// unmarked relay is used for both.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RelayList {
    /// Relay entries in tag order.
    pub entries: Vec<RelayListEntry>,
    /// Creation time of the source event (Unix seconds).
    pub created_at: u64,
}

impl RelayList {
    /// Creates a relay list from entries.
    #[must_use]
    pub const fn new(entries: Vec<RelayListEntry>, created_at: u64) -> Self {
        Self {
            entries,
            created_at,
        }
    }

    /// Parses a relay list event.
    ///
    /// Tags with unparseable URLs are skipped. A missing or unknown marker
    /// means the relay is used for both reading and writing.
    ///
    /// # Errors
    ///
    /// Returns an error if the event is not kind 10002.
    pub fn from_event(event: &Event) -> RelayResult<Self> {
        let kind = event.kind.as_u16();
        if kind != KIND_RELAY_LIST {
            return Err(RelayError::UnexpectedKind {
                expected: KIND_RELAY_LIST,
                actual: kind,
            });
        }

        let mut entries: Vec<RelayListEntry> = Vec::new();
        for tag in &event.tags {
            if tag.first().map(String::as_str) != Some("r") {
                continue;
            }
            let Some(raw) = tag.get(1) else {
                continue;
            };
            let Ok(url) = RelayUrl::parse(raw) else {
                tracing::debug!(url = %raw, "skipping unparseable relay list entry");
                continue;
            };

            let (read, write) = match tag.get(2).map(String::as_str) {
                Some("read") => (true, false),
                Some("write") => (false, true),
                None | Some("") => (true, true),
                Some(other) => {
                    tracing::debug!(url = %url, marker = other, "unknown relay list marker");
                    (true, true)
                }
            };

            if let Some(existing) = entries.iter_mut().find(|e| e.url == url) {
                existing.read |= read;
                existing.write |= write;
            } else {
                entries.push(RelayListEntry { url, read, write });
            }
        }

        Ok(Self::new(entries, event.created_at.as_u64()))
    }

    /// Returns the relays used in the given mode, in list order.
    #[must_use]
    pub fn relays(&self, mode: RelayMode) -> Vec<RelayUrl> {
        self.entries
            .iter()
            .filter(|entry| entry.supports(mode))
            .map(|entry| entry.url.clone())
            .collect()
    }
}
