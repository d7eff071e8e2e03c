//! Transport contract consumed by the feed assembler.
//!
//! The assembler never talks to relays itself. It hands a [`Request`] and a
//! [`TransportSink`] to a [`Transport`] and receives batches and close
//! notifications on the sink. Per subscription, messages must be sent in
//! arrival order; across subscriptions no order is assumed.
//!
//! # Subscription Kinds
//!
//! | Call        | Lifetime                         | Events delivered via      |
//! |-------------|----------------------------------|---------------------------|
//! | `subscribe` | until closed by either side      | sink batches              |
//! | `fetch`     | one-shot, closes when exhausted  | sink batches              |
//! | `cursor`    | pages backward on demand         | `HistoryCursor::take`     |

use std::fmt;

use nostr::Filter;
use tokio::sync::mpsc;

use crate::event::Event;
use crate::relay::RelayUrl;

/// Identifies one subscription opened by a transport.
///
/// Ids must be unique per transport for the lifetime of an assembler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Wraps a raw id.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// The raw id.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Relays and filters for one subscription.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// Relays to query.
    pub relays: Vec<RelayUrl>,
    /// Filters to apply.
    pub filters: Vec<Filter>,
}

impl Request {
    /// Creates a request.
    #[must_use]
    pub const fn new(relays: Vec<RelayUrl>, filters: Vec<Filter>) -> Self {
        Self { relays, filters }
    }

    /// Returns true if any filter carries an `until` bound.
    #[must_use]
    pub fn has_upper_bound(&self) -> bool {
        self.filters.iter().any(|filter| filter.until.is_some())
    }
}

/// A message from the transport to the assembler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportMessage {
    /// Events received on a subscription.
    Batch {
        /// The subscription the events belong to.
        subscription: SubscriptionId,
        /// The events, in arrival order.
        events: Vec<Event>,
    },
    /// The subscription ended, either because the relay closed it, it was
    /// exhausted, or it was closed locally.
    Closed {
        /// The subscription that ended.
        subscription: SubscriptionId,
    },
}

/// Channel the transport delivers messages on.
pub type TransportSink = mpsc::UnboundedSender<TransportMessage>;

/// A handle to an open subscription.
pub trait SubscriptionHandle: Send {
    /// The subscription's id.
    fn id(&self) -> SubscriptionId;

    /// Closes the subscription. Closing twice has no effect.
    fn close(&self);
}

/// Backward-paging access to stored events.
pub trait HistoryCursor: Send {
    /// Starts paging up to `n` events across the relay set.
    ///
    /// Returns one handle per sub-request; each reports `Closed` on the
    /// sink when its page is complete.
    fn load(&mut self, n: usize) -> Vec<Box<dyn SubscriptionHandle>>;

    /// Takes up to `n` buffered events, newest first, starting further
    /// sub-requests as needed.
    fn take(&mut self, n: usize) -> (Vec<Box<dyn SubscriptionHandle>>, Vec<Event>);
}

/// Opens subscriptions against relays.
pub trait Transport: Send + Sync {
    /// Opens a streaming subscription.
    fn subscribe(&self, request: &Request, sink: TransportSink) -> Box<dyn SubscriptionHandle>;

    /// Runs a one-shot query; the handle closes once results are exhausted.
    fn fetch(&self, request: &Request, sink: TransportSink) -> Box<dyn SubscriptionHandle>;

    /// Opens a historical cursor.
    fn cursor(&self, request: &Request, sink: TransportSink) -> Box<dyn HistoryCursor>;
}
