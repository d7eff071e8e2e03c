//! Reusable test helpers for routing and feed integration tests.
//!
//! Events are built directly from deterministic ids and keys. The
//! [`MockTransport`] is an in-memory transport whose history, parent store
//! and page behaviour are scripted per test; it records every request so
//! tests can assert on what the assembler asked for.

#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use nostr::{EventId, Keys, Kind, PublicKey, Timestamp};
use outbox_core::event::Event;
use outbox_core::feed::{
    HistoryCursor, Request, SubscriptionHandle, SubscriptionId, Transport, TransportMessage,
    TransportSink,
};
use outbox_core::relay::RelayUrl;

// ============================================================================
// Tracing
// ============================================================================

/// Routes `tracing` output to the test harness. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

// ============================================================================
// Event fixtures
// ============================================================================

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

/// Current wall-clock time in seconds.
pub fn now_secs() -> u64 {
    Timestamp::now().as_u64()
}

/// A relay URL for `host.example.com`.
pub fn relay(host: &str) -> RelayUrl {
    RelayUrl::parse(&format!("wss://{host}.example.com")).expect("fixture relay is valid")
}

/// Builds a fixture event.
pub fn event(id: u64, author: u64, kind: u16, created_at: u64, tags: Vec<Vec<String>>) -> Event {
    Event {
        id: event_id(id),
        pubkey: pubkey(author),
        created_at: Timestamp::from(created_at),
        kind: Kind::from(kind),
        tags,
        content: format!("note {id}"),
        seen_on: BTreeSet::new(),
    }
}

/// A kind 1 note by author 1.
pub fn note(id: u64, created_at: u64) -> Event {
    event(id, 1, 1, created_at, Vec::new())
}

/// A kind 1 reply by author 1 with marked root and reply tags.
pub fn reply(id: u64, created_at: u64, root: u64, parent: u64) -> Event {
    event(id, 1, 1, created_at, reply_tags(root, parent))
}

/// A kind 7 reaction to `target`.
pub fn reaction(id: u64, created_at: u64, target: u64) -> Event {
    event(id, 1, 7, created_at, reply_tags(target, target))
}

fn reply_tags(root: u64, parent: u64) -> Vec<Vec<String>> {
    vec![
        vec![
            "e".to_string(),
            event_id(root).to_hex(),
            String::new(),
            "root".to_string(),
        ],
        vec![
            "e".to_string(),
            event_id(parent).to_hex(),
            String::new(),
            "reply".to_string(),
        ],
    ]
}

/// A NIP-65 relay list for `author` with `(url, marker)` entries.
pub fn relay_list<S: AsRef<str>>(
    author: u64,
    created_at: u64,
    entries: &[(S, Option<&str>)],
) -> Event {
    let tags = entries
        .iter()
        .map(|(url, marker)| {
            let mut tag = vec!["r".to_string(), url.as_ref().to_string()];
            if let Some(marker) = marker {
                tag.push((*marker).to_string());
            }
            tag
        })
        .collect();
    event(created_at, author, 10002, created_at, tags)
}

// ============================================================================
// Mock transport
// ============================================================================

/// What kind of call opened a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opened {
    Live,
    Fetch,
    Page,
}

#[derive(Default)]
struct MockState {
    next_id: u64,
    history: VecDeque<Event>,
    parents: HashMap<EventId, Event>,
    page_handles: usize,
    hold_pages: bool,
    opened: Vec<(SubscriptionId, Opened)>,
    closed: HashSet<SubscriptionId>,
    fetches: Vec<Request>,
    live: Option<(SubscriptionId, Request, TransportSink)>,
    cursor_sink: Option<TransportSink>,
    pages: Vec<SubscriptionId>,
}

impl MockState {
    fn open(&mut self, kind: Opened) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId::new(self.next_id);
        self.opened.push((id, kind));
        id
    }
}

/// In-memory transport with scripted responses.
#[derive(Clone)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    /// A transport with no history, no parents and three page sub-requests
    /// that complete immediately.
    pub fn new() -> Self {
        let state = MockState {
            page_handles: 3,
            ..MockState::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Queues historical events, served newest first in the given order.
    pub fn with_history(self, events: Vec<Event>) -> Self {
        self.lock().history.extend(events);
        self
    }

    /// Makes `event` available to parent fetches.
    pub fn with_parent(self, event: Event) -> Self {
        self.lock().parents.insert(event.id, event);
        self
    }

    /// Sets how many sub-requests the initial page opens.
    pub fn with_page_handles(self, n: usize) -> Self {
        self.lock().page_handles = n;
        self
    }

    /// Keeps page sub-requests open until [`close_page`](Self::close_page).
    pub fn hold_pages(self) -> Self {
        self.lock().hold_pages = true;
        self
    }

    /// Reports the `index`th page sub-request as complete.
    pub fn close_page(&self, index: usize) {
        let mut state = self.lock();
        let Some(id) = state.pages.get(index).copied() else {
            return;
        };
        if let Some(sink) = state.cursor_sink.as_ref() {
            let _ = sink.send(TransportMessage::Closed { subscription: id });
        }
        state.closed.insert(id);
    }

    /// Delivers events on the live subscription. Returns false if none is open.
    pub fn send_live(&self, events: Vec<Event>) -> bool {
        let state = self.lock();
        let Some((id, _, sink)) = state.live.as_ref() else {
            return false;
        };
        sink.send(TransportMessage::Batch {
            subscription: *id,
            events,
        })
        .is_ok()
    }

    /// The live subscription's request, if one was opened.
    pub fn live_request(&self) -> Option<Request> {
        self.lock().live.as_ref().map(|(_, request, _)| request.clone())
    }

    /// Every parent fetch issued so far.
    pub fn fetches(&self) -> Vec<Request> {
        self.lock().fetches.clone()
    }

    /// Number of subscriptions opened so far.
    pub fn opened_count(&self) -> usize {
        self.lock().opened.len()
    }

    /// Returns true if every opened subscription has ended, whether closed
    /// by the caller or completed by the transport.
    pub fn all_closed(&self) -> bool {
        let state = self.lock();
        state.opened.iter().all(|(id, _)| state.closed.contains(id))
    }

    /// Number of subscriptions of `kind` opened so far.
    pub fn opened_of(&self, kind: Opened) -> usize {
        self.lock().opened.iter().filter(|(_, k)| *k == kind).count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().expect("mock state poisoned")
    }

    fn handle(&self, id: SubscriptionId) -> Box<dyn SubscriptionHandle> {
        Box::new(MockHandle {
            id,
            state: Arc::clone(&self.state),
        })
    }
}

impl Transport for MockTransport {
    fn subscribe(&self, request: &Request, sink: TransportSink) -> Box<dyn SubscriptionHandle> {
        let id = {
            let mut state = self.lock();
            let id = state.open(Opened::Live);
            state.live = Some((id, request.clone(), sink));
            id
        };
        self.handle(id)
    }

    fn fetch(&self, request: &Request, sink: TransportSink) -> Box<dyn SubscriptionHandle> {
        let id = {
            let mut state = self.lock();
            let id = state.open(Opened::Fetch);
            state.fetches.push(request.clone());

            let found: Vec<Event> = request
                .filters
                .iter()
                .flat_map(|filter| filter.ids.iter().flatten())
                .filter_map(|wanted| state.parents.get(wanted).cloned())
                .collect();
            if !found.is_empty() {
                let _ = sink.send(TransportMessage::Batch {
                    subscription: id,
                    events: found,
                });
            }
            let _ = sink.send(TransportMessage::Closed { subscription: id });
            state.closed.insert(id);
            id
        };
        self.handle(id)
    }

    fn cursor(&self, _request: &Request, sink: TransportSink) -> Box<dyn HistoryCursor> {
        self.lock().cursor_sink = Some(sink.clone());
        Box::new(MockCursor {
            transport: self.clone(),
            sink,
        })
    }
}

struct MockHandle {
    id: SubscriptionId,
    state: Arc<Mutex<MockState>>,
}

impl SubscriptionHandle for MockHandle {
    fn id(&self) -> SubscriptionId {
        self.id
    }

    fn close(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.closed.insert(self.id);
        }
    }
}

struct MockCursor {
    transport: MockTransport,
    sink: TransportSink,
}

impl HistoryCursor for MockCursor {
    fn load(&mut self, _n: usize) -> Vec<Box<dyn SubscriptionHandle>> {
        let ids: Vec<SubscriptionId> = {
            let mut state = self.transport.lock();
            let ids: Vec<SubscriptionId> = (0..state.page_handles)
                .map(|_| state.open(Opened::Page))
                .collect();
            state.pages.extend(ids.iter().copied());
            if !state.hold_pages {
                for id in &ids {
                    let _ = self.sink.send(TransportMessage::Closed { subscription: *id });
                    state.closed.insert(*id);
                }
            }
            ids
        };
        ids.into_iter().map(|id| self.transport.handle(id)).collect()
    }

    fn take(&mut self, n: usize) -> (Vec<Box<dyn SubscriptionHandle>>, Vec<Event>) {
        let mut state = self.transport.lock();
        let count = n.min(state.history.len());
        let events = state.history.drain(..count).collect();
        (Vec::new(), events)
    }
}
