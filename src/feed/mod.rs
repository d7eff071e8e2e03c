//! Feed assembly.
//!
//! Turns out-of-order event batches from many relays into one deduplicated,
//! threaded feed sorted newest first.
//!
//! # Architecture
//!
//! ```text
//! Transport (cursor, live subscription, parent fetches)
//!     │  TransportMessage over an unbounded channel
//!     ▼
//! FeedAssembler task
//!     ├── ReadyBarrier   first page waits for slow relays
//!     ├── DeferQueue     orphans and backlog events held back
//!     ├── FeedState      arena of events, ordered top-level ids
//!     └── Broadcaster    publishes DisplayEvent trees to observers
//! ```
//!
//! # Feed Invariants
//!
//! After every commit the top level holds no duplicate ids and no reaction
//! kinds, and is sorted by `created_at` descending (ties by id descending).
//! Every reply list is unique by id and oldest first.

mod assembler;
mod barrier;
mod broadcast;
mod defer;
mod error;
mod filter;
mod state;
mod transport;

pub use assembler::{AssemblerState, FeedAssembler, FeedListener};
pub use barrier::ReadyBarrier;
pub use broadcast::{Broadcaster, ListenerId};
pub use defer::{DeferQueue, DeferralPasses, Pending};
pub use error::{FeedError, FeedResult};
pub use filter::{ancient_cutoff, estimate_time_span, filter_generality, live_filters};
pub use state::FeedState;
pub use transport::{
    HistoryCursor, Request, SubscriptionHandle, SubscriptionId, Transport, TransportMessage,
    TransportSink,
};

use std::time::Duration;

use tokio::time::Instant;

/// Roughly 30 years, used when `now + delay` does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Returns `now + delay`, saturating to a far-future deadline on overflow.
pub(crate) fn deadline_after(now: Instant, delay: Duration) -> Instant {
    now.checked_add(delay)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deadline_after_adds_delay() {
        let now = Instant::now();
        assert_eq!(
            deadline_after(now, Duration::from_millis(500)),
            now + Duration::from_millis(500)
        );
    }

    #[test]
    fn deadline_after_saturates_on_overflow() {
        let now = Instant::now();
        let deadline = deadline_after(now, Duration::from_millis(u64::MAX));
        assert!(deadline > now);
    }
}
