//! Readiness barrier for the first historical page.
//!
//! Relays answer at very different speeds. Committing the first page as
//! soon as the fastest relay replies would show its events first and then
//! reorder the feed as the rest arrive, so loads wait until a fraction of
//! the initial sub-requests have closed or a timeout passes.

use std::collections::HashSet;
use std::time::Duration;

use tokio::time::Instant;

use super::deadline_after;
use super::transport::SubscriptionId;

/// Tracks completion of the initial page's sub-requests.
#[derive(Debug, Default)]
pub struct ReadyBarrier {
    pending: HashSet<SubscriptionId>,
    needed: usize,
    closed: usize,
    deadline: Option<Instant>,
    ready: bool,
}

impl ReadyBarrier {
    /// A barrier that has not been armed yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms the barrier for `ids`.
    ///
    /// It opens once `ceil(threshold × ids)` of them have closed, or at
    /// `now + timeout`. With no sub-requests it opens immediately.
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn arm(
        &mut self,
        ids: impl IntoIterator<Item = SubscriptionId>,
        threshold: f64,
        timeout: Duration,
        now: Instant,
    ) {
        self.pending = ids.into_iter().collect();
        self.needed = (threshold * self.pending.len() as f64).ceil() as usize;
        self.closed = 0;
        self.deadline = Some(deadline_after(now, timeout));
        self.ready = self.needed == 0;
    }

    /// Returns true once the barrier has opened.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        self.ready
    }

    /// When the barrier will open regardless of progress.
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        if self.ready {
            None
        } else {
            self.deadline
        }
    }

    /// Records a closed subscription. Returns true if this opened the barrier.
    pub fn on_closed(&mut self, id: SubscriptionId) -> bool {
        if self.ready || !self.pending.remove(&id) {
            return false;
        }
        self.closed += 1;
        if self.closed >= self.needed {
            self.open();
            return true;
        }
        false
    }

    /// Opens the barrier if its deadline has passed. Returns true if this
    /// opened it.
    pub fn on_deadline(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if !self.ready && deadline <= now => {
                tracing::debug!(
                    closed = self.closed,
                    needed = self.needed,
                    "readiness barrier timed out"
                );
                self.open();
                true
            }
            _ => false,
        }
    }

    fn open(&mut self) {
        self.ready = true;
        self.pending.clear();
    }
}
