//! Deferral passes for historical events.
//!
//! Two passes run over every chunk before it is committed:
//!
//! 1. **orphans**: a reply whose parent is not known yet is held back so
//!    it does not appear without context and then jump into a thread.
//! 2. **ancient**: an event older than the filter's estimated time span is
//!    held back so a relay's backlog dump does not push ahead of newer
//!    content from slower relays.
//!
//! Held events re-enter both passes when their delay expires. Each event is
//! held at most once per pass, so every event is eventually released.

use std::time::Duration;

use nostr::{EventId, Timestamp};
use tokio::time::Instant;

use super::deadline_after;
use crate::event::Event;

/// An event moving through the deferral passes.
#[derive(Debug, Clone)]
pub struct Pending {
    event: Event,
    orphan_checked: bool,
    ancient_checked: bool,
}

impl Pending {
    /// Wraps a fresh event that has not been deferred yet.
    #[must_use]
    pub const fn new(event: Event) -> Self {
        Self {
            event,
            orphan_checked: false,
            ancient_checked: false,
        }
    }

    /// The wrapped event.
    #[must_use]
    pub const fn event(&self) -> &Event {
        &self.event
    }
}

#[derive(Debug, Clone)]
struct Deferred {
    pending: Pending,
    due: Instant,
    /// Held by the orphan pass rather than the ancient pass.
    orphan: bool,
}

/// Settings for one run of the passes.
#[derive(Debug, Clone, Copy)]
pub struct DeferralPasses {
    /// Whether the orphan pass runs at all.
    pub orphans: bool,
    /// Events created before this are ancient.
    pub cutoff: Timestamp,
    /// Hold time for orphans.
    pub orphan_delay: Duration,
    /// Hold time for ancient events.
    pub ancient_delay: Duration,
}

/// Events held back by the deferral passes, with their due times.
#[derive(Debug, Default)]
pub struct DeferQueue {
    entries: Vec<Deferred>,
}

impl DeferQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of held events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Earliest due time, if anything is held.
    #[must_use]
    pub fn next_due(&self) -> Option<Instant> {
        self.entries.iter().map(|entry| entry.due).min()
    }

    /// Removes and returns every entry due at or before `now`.
    pub fn take_due(&mut self, now: Instant) -> Vec<Pending> {
        self.take_where(|entry| entry.due <= now)
    }

    /// Removes and returns held orphans whose parent is now known.
    pub fn take_resolved(&mut self, is_known: impl Fn(&EventId) -> bool) -> Vec<Pending> {
        self.take_where(|entry| {
            entry.orphan
                && entry
                    .pending
                    .event
                    .parent_id()
                    .is_some_and(|parent| is_known(&parent))
        })
    }

    /// Drops everything held.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Runs both passes over `pending`, holding back what they catch, and
    /// returns the events that may be committed now.
    pub fn run(
        &mut self,
        pending: Vec<Pending>,
        passes: &DeferralPasses,
        is_known: impl Fn(&EventId) -> bool,
        now: Instant,
    ) -> Vec<Event> {
        let mut released = Vec::with_capacity(pending.len());

        for mut item in pending {
            if passes.orphans && !item.orphan_checked {
                if let Some(parent) = item.event.parent_id() {
                    if !is_known(&parent) {
                        item.orphan_checked = true;
                        tracing::debug!(event = %item.event.id, parent = %parent, "deferring orphan");
                        self.hold(item, deadline_after(now, passes.orphan_delay), true);
                        continue;
                    }
                }
            }

            if !item.ancient_checked && item.event.created_at < passes.cutoff {
                item.ancient_checked = true;
                tracing::debug!(event = %item.event.id, "deferring ancient event");
                self.hold(item, deadline_after(now, passes.ancient_delay), false);
                continue;
            }

            released.push(item.event);
        }

        released
    }

    fn hold(&mut self, pending: Pending, due: Instant, orphan: bool) {
        self.entries.push(Deferred {
            pending,
            due,
            orphan,
        });
    }

    fn take_where(&mut self, mut predicate: impl FnMut(&Deferred) -> bool) -> Vec<Pending> {
        let mut taken = Vec::new();
        let mut kept = Vec::with_capacity(self.entries.len());
        for entry in self.entries.drain(..) {
            if predicate(&entry) {
                taken.push(entry.pending);
            } else {
                kept.push(entry);
            }
        }
        self.entries = kept;
        taken
    }
}
