//! Thread references (NIP-10).
//!
//! Replies point at their ancestors through `e` tags. Two encodings exist:
//!
//! - **Marked**: `["e", <id>, <relay>, "root" | "reply" | "mention"]`
//! - **Positional** (deprecated): the first `e` tag is the root and the last
//!   one is the direct parent
//!
//! Marked tags win whenever any `root`/`reply` marker is present.

use nostr::EventId;

/// A reference to another event, with the relay hint from the tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRef {
    /// The referenced event id.
    pub id: EventId,
    /// Relay hint from tag position 2, if non-empty.
    pub relay_hint: Option<String>,
}

/// Root and parent references of an event.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ThreadRefs {
    /// Thread root.
    pub root: Option<EventRef>,
    /// Direct parent.
    pub parent: Option<EventRef>,
}

impl ThreadRefs {
    /// Parses thread references from raw tags.
    #[must_use]
    pub fn from_tags(tags: &[Vec<String>]) -> Self {
        let refs: Vec<(EventRef, Option<&str>)> = tags
            .iter()
            .filter(|tag| tag.first().map(String::as_str) == Some("e"))
            .filter_map(|tag| {
                let id = EventId::from_hex(tag.get(1)?).ok()?;
                let relay_hint = tag.get(2).filter(|hint| !hint.is_empty()).cloned();
                let marker = tag.get(3).map(String::as_str);
                Some((EventRef { id, relay_hint }, marker))
            })
            .collect();

        let marked = refs
            .iter()
            .any(|(_, marker)| matches!(marker, Some("root" | "reply")));

        if marked {
            let find = |wanted: &str| {
                refs.iter()
                    .find(|(_, marker)| *marker == Some(wanted))
                    .map(|(reference, _)| reference.clone())
            };
            let root = find("root");
            let parent = find("reply").or_else(|| root.clone());
            return Self { root, parent };
        }

        let positional: Vec<&EventRef> = refs
            .iter()
            .filter(|(_, marker)| *marker != Some("mention"))
            .map(|(reference, _)| reference)
            .collect();

        Self {
            root: positional.first().map(|r| (*r).clone()),
            parent: positional.last().map(|r| (*r).clone()),
        }
    }

    /// Relay hints for the parent, if any.
    #[must_use]
    pub fn parent_hint(&self) -> Option<&str> {
        self.parent.as_ref().and_then(|r| r.relay_hint.as_deref())
    }

    /// Relay hints for the root, if any.
    #[must_use]
    pub fn root_hint(&self) -> Option<&str> {
        self.root.as_ref().and_then(|r| r.relay_hint.as_deref())
    }
}
