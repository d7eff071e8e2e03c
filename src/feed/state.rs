//! Feed state: an arena of events plus the ordered top-level feed.
//!
//! Every event the assembler has committed or resolved lives in one arena
//! keyed by id. Threads are stored as id links from parent to replies
//! rather than nested values, so a node can become a parent after the fact
//! without rebuilding anything. [`DisplayEvent`] trees are materialized
//! from the arena when the feed is published.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use nostr::EventId;

use crate::event::{DisplayEvent, Event};

#[derive(Debug, Clone)]
struct Node {
    event: Event,
    replies: Vec<EventId>,
}

/// Newest first; ties broken by id so the order is total.
fn feed_order(a: &Event, b: &Event) -> Ordering {
    b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id))
}

/// Oldest first, for reply lists.
fn reply_order(a: &Event, b: &Event) -> Ordering {
    a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id))
}

/// Arena of known events and the ordered list of top-level ids.
#[derive(Debug, Clone, Default)]
pub struct FeedState {
    nodes: HashMap<EventId, Node>,
    feed: Vec<EventId>,
    in_feed: HashSet<EventId>,
}

impl FeedState {
    /// Creates an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the event is known, either committed or resolved.
    #[must_use]
    pub fn contains(&self, id: &EventId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Number of top-level entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.feed.len()
    }

    /// Returns true if the feed has no top-level entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.feed.is_empty()
    }

    /// Top-level ids in feed order.
    #[must_use]
    pub fn top_level(&self) -> &[EventId] {
        &self.feed
    }

    /// Records a fetched parent without putting it in the feed.
    ///
    /// Returns true if the event was new.
    pub fn resolve(&mut self, event: Event) -> bool {
        if self.nodes.contains_key(&event.id) {
            return false;
        }
        self.nodes.insert(event.id, Node::new(event));
        true
    }

    /// Commits a chunk of events to the feed.
    ///
    /// Each event is threaded under the top-most ancestor reachable through
    /// known parents; that ancestor becomes a top-level candidate unless it
    /// is a reaction or already in the feed. Returns true if the feed or any
    /// reply list changed.
    pub fn commit(&mut self, mut events: Vec<Event>) -> bool {
        events.sort_by(feed_order);
        events.dedup_by(|a, b| a.id == b.id);

        // Insert the whole chunk first so a parent later in the chunk is
        // known when its replies are walked.
        let ids: Vec<EventId> = events.iter().map(|event| event.id).collect();
        for event in events {
            self.nodes.entry(event.id).or_insert_with(|| Node::new(event));
        }

        let mut changed = false;
        let mut candidates: Vec<EventId> = Vec::new();

        for id in ids {
            let (top, attached) = self.attach_upward(id);
            changed |= attached;

            let Some(node) = self.nodes.get(&top) else {
                continue;
            };
            if node.event.is_reaction() || self.in_feed.contains(&top) {
                continue;
            }
            if !candidates.contains(&top) {
                candidates.push(top);
            }
        }

        for id in candidates {
            if self.in_feed.insert(id) {
                self.feed.push(id);
                changed = true;
            }
        }

        if changed {
            self.sort_feed();
        }
        changed
    }

    /// Builds the display tree for every top-level entry.
    #[must_use]
    pub fn materialize(&self) -> Vec<DisplayEvent> {
        self.feed
            .iter()
            .filter_map(|id| {
                let mut visiting = HashSet::new();
                self.display(id, &mut visiting)
            })
            .collect()
    }

    /// Walks from `id` up through known parents, linking each step.
    ///
    /// Stops at a node already shown at top level, at an unknown parent, or
    /// when a cycle is detected. Returns the top-most node reached and
    /// whether any new link was made.
    fn attach_upward(&mut self, id: EventId) -> (EventId, bool) {
        let mut visited: HashSet<EventId> = HashSet::new();
        let mut current = id;
        let mut attached = false;

        loop {
            visited.insert(current);
            if self.in_feed.contains(&current) {
                break;
            }

            let Some(parent_id) = self.nodes.get(&current).and_then(|n| n.event.parent_id()) else {
                break;
            };
            if visited.contains(&parent_id) {
                tracing::debug!(event = %current, parent = %parent_id, "reply cycle detected");
                break;
            }
            let Some(parent) = self.nodes.get_mut(&parent_id) else {
                break;
            };

            if !parent.replies.contains(&current) {
                parent.replies.push(current);
                attached = true;
            }
            current = parent_id;
        }

        (current, attached)
    }

    fn sort_feed(&mut self) {
        let nodes = &self.nodes;
        self.feed.sort_by(|a, b| match (nodes.get(a), nodes.get(b)) {
            (Some(a), Some(b)) => feed_order(&a.event, &b.event),
            _ => b.cmp(a),
        });
    }

    fn display(&self, id: &EventId, visiting: &mut HashSet<EventId>) -> Option<DisplayEvent> {
        let node = self.nodes.get(id)?;
        if !visiting.insert(*id) {
            return None;
        }

        let mut replies: Vec<DisplayEvent> = node
            .replies
            .iter()
            .filter_map(|reply| self.display(reply, visiting))
            .collect();
        replies.sort_by(|a, b| reply_order(&a.event, &b.event));

        visiting.remove(id);
        Some(DisplayEvent {
            event: node.event.clone(),
            replies,
        })
    }
}

impl Node {
    const fn new(event: Event) -> Self {
        Self {
            event,
            replies: Vec::new(),
        }
    }
}
