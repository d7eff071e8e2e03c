//! The feed assembler.
//!
//! A [`FeedAssembler`] is a cheap, cloneable handle to a task that owns all
//! feed state. The task multiplexes three inputs with `tokio::select!`:
//! commands from handles, messages from the transport, and its own timer
//! deadlines (readiness timeout, live batch flush, deferred retries). Since
//! only the task touches the state, nothing is locked.
//!
//! # Lifecycle
//!
//! ```text
//! Idle ──start()/load()──▶ Active ──stop()──▶ Stopped
//!   └──────────────────stop()──────────────────▲
//! ```
//!
//! Starting opens a historical cursor (and a live subscription when no
//! filter has an `until` bound) and requests the initial page. Stopping
//! closes every tracked subscription and drops buffered and deferred work;
//! after that every command is answered without touching the feed.
//!
//! # Data Paths
//!
//! | Source           | Path                                                  |
//! |------------------|-------------------------------------------------------|
//! | `load(n)`        | cursor → discard → parent fetch → deferral → commit   |
//! | live batches     | coalesce → discard → parent fetch → live buffer       |
//! | `load_buffer()`  | live buffer → commit                                  |
//! | parent batches   | side map only, never top level                        |
//! | deferral expiry  | deferral passes → commit                              |

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use nostr::{EventId, Filter, Timestamp};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use super::barrier::ReadyBarrier;
use super::deadline_after;
use super::broadcast::{Broadcaster, ListenerId};
use super::defer::{DeferQueue, DeferralPasses, Pending};
use super::error::{FeedError, FeedResult};
use super::filter::{ancient_cutoff, live_filters};
use super::state::FeedState;
use super::transport::{
    HistoryCursor, Request, SubscriptionHandle, SubscriptionId, Transport, TransportMessage,
    TransportSink,
};
use crate::config::FeedConfig;
use crate::event::{DisplayEvent, Event, MutePredicate};
use crate::relay::RelayUrl;

/// Lifecycle state of an assembler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssemblerState {
    /// Constructed; no subscriptions open yet.
    Idle,
    /// Cursor and live subscription open.
    Active,
    /// Terminal; every subscription has been closed.
    Stopped,
}

/// Callback registered with [`FeedAssembler::observe`].
pub type FeedListener = Box<dyn FnMut(&[DisplayEvent]) + Send>;

enum Command {
    Start,
    Load {
        n: usize,
        done: oneshot::Sender<()>,
    },
    LoadBuffer {
        done: oneshot::Sender<()>,
    },
    Stop {
        done: oneshot::Sender<()>,
    },
    Observe {
        listener: FeedListener,
        reply: oneshot::Sender<ListenerId>,
    },
    Unobserve {
        id: ListenerId,
        reply: oneshot::Sender<bool>,
    },
    Snapshot {
        reply: oneshot::Sender<Vec<DisplayEvent>>,
    },
    Buffered {
        reply: oneshot::Sender<usize>,
    },
    State {
        reply: oneshot::Sender<AssemblerState>,
    },
}

/// Handle to a running feed assembler.
///
/// Dropping every handle ends the task and closes its subscriptions.
#[derive(Debug, Clone)]
pub struct FeedAssembler {
    commands: mpsc::UnboundedSender<Command>,
}

impl FeedAssembler {
    /// Spawns an assembler for `request` on the current Tokio runtime.
    ///
    /// The assembler starts `Idle`; it opens subscriptions on [`start`] or
    /// the first [`load`].
    ///
    /// [`start`]: Self::start
    /// [`load`]: Self::load
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::InvalidRequest`] if the request has no filters,
    /// or [`FeedError::NoRuntime`] when called outside a Tokio runtime.
    pub fn spawn(
        transport: Arc<dyn Transport>,
        request: Request,
        mute: Arc<dyn MutePredicate>,
        config: FeedConfig,
    ) -> FeedResult<Self> {
        if request.filters.is_empty() {
            return Err(FeedError::InvalidRequest(
                "at least one filter is required".to_string(),
            ));
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| FeedError::NoRuntime)?;

        let (commands, command_rx) = mpsc::unbounded_channel();
        let (sink, message_rx) = mpsc::unbounded_channel();
        let actor = Actor::new(transport, request, mute, config, sink);
        runtime.spawn(actor.run(command_rx, message_rx));

        Ok(Self { commands })
    }

    /// Opens the cursor and live subscription without loading anything.
    ///
    /// Has no effect once started or stopped.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Closed`] if the task has ended.
    pub fn start(&self) -> FeedResult<()> {
        self.commands.send(Command::Start)?;
        Ok(())
    }

    /// Loads up to `n` historical events into the feed.
    ///
    /// Waits for the readiness barrier first. Events held back by the
    /// deferral passes are committed later, when their delay expires. A
    /// no-op once stopped.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Closed`] if the task has ended.
    pub async fn load(&self, n: usize) -> FeedResult<()> {
        let (done, wait) = oneshot::channel();
        self.commands.send(Command::Load { n, done })?;
        wait.await?;
        Ok(())
    }

    /// Commits every buffered live event to the feed and clears the buffer.
    ///
    /// With an empty buffer the feed is left untouched and nothing is
    /// published. A no-op once stopped.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Closed`] if the task has ended.
    pub async fn load_buffer(&self) -> FeedResult<()> {
        let (done, wait) = oneshot::channel();
        self.commands.send(Command::LoadBuffer { done })?;
        wait.await?;
        Ok(())
    }

    /// Stops the assembler, closing every open subscription.
    ///
    /// Idempotent; stopping an assembler whose task has already ended does
    /// nothing.
    pub async fn stop(&self) {
        let (done, wait) = oneshot::channel();
        if self.commands.send(Command::Stop { done }).is_err() {
            tracing::warn!("stop requested after feed assembler task ended");
            return;
        }
        let _ = wait.await;
    }

    /// Registers a listener called with the full feed now and after every
    /// change.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Closed`] if the task has ended.
    pub async fn observe(
        &self,
        listener: impl FnMut(&[DisplayEvent]) + Send + 'static,
    ) -> FeedResult<ListenerId> {
        let (reply, wait) = oneshot::channel();
        self.commands.send(Command::Observe {
            listener: Box::new(listener),
            reply,
        })?;
        Ok(wait.await?)
    }

    /// Removes a listener. Returns false if it was not registered.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Closed`] if the task has ended.
    pub async fn unobserve(&self, id: ListenerId) -> FeedResult<bool> {
        let (reply, wait) = oneshot::channel();
        self.commands.send(Command::Unobserve { id, reply })?;
        Ok(wait.await?)
    }

    /// The current feed.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Closed`] if the task has ended.
    pub async fn snapshot(&self) -> FeedResult<Vec<DisplayEvent>> {
        let (reply, wait) = oneshot::channel();
        self.commands.send(Command::Snapshot { reply })?;
        Ok(wait.await?)
    }

    /// Number of live events waiting for [`load_buffer`](Self::load_buffer).
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Closed`] if the task has ended.
    pub async fn buffered(&self) -> FeedResult<usize> {
        let (reply, wait) = oneshot::channel();
        self.commands.send(Command::Buffered { reply })?;
        Ok(wait.await?)
    }

    /// The assembler's lifecycle state.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Closed`] if the task has ended.
    pub async fn state(&self) -> FeedResult<AssemblerState> {
        let (reply, wait) = oneshot::channel();
        self.commands.send(Command::State { reply })?;
        Ok(wait.await?)
    }
}

// ==================== Task ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SubscriptionKind {
    Live,
    History,
    Parents,
}

struct Tracked {
    handle: Box<dyn SubscriptionHandle>,
    kind: SubscriptionKind,
}

struct Actor {
    transport: Arc<dyn Transport>,
    request: Request,
    mute: Arc<dyn MutePredicate>,
    config: FeedConfig,
    sink: TransportSink,

    status: AssemblerState,
    cursor: Option<Box<dyn HistoryCursor>>,
    subscriptions: HashMap<SubscriptionId, Tracked>,
    barrier: ReadyBarrier,
    pending_loads: VecDeque<(usize, oneshot::Sender<()>)>,

    state: FeedState,
    feed: Broadcaster<Vec<DisplayEvent>>,
    deferred: DeferQueue,
    requested_parents: HashSet<EventId>,

    live_pending: Vec<Event>,
    live_flush_at: Option<Instant>,
    live_buffer: Vec<Event>,
}

impl Actor {
    fn new(
        transport: Arc<dyn Transport>,
        request: Request,
        mute: Arc<dyn MutePredicate>,
        config: FeedConfig,
        sink: TransportSink,
    ) -> Self {
        Self {
            transport,
            request,
            mute,
            config,
            sink,
            status: AssemblerState::Idle,
            cursor: None,
            subscriptions: HashMap::new(),
            barrier: ReadyBarrier::new(),
            pending_loads: VecDeque::new(),
            state: FeedState::new(),
            feed: Broadcaster::new(Vec::new()),
            deferred: DeferQueue::new(),
            requested_parents: HashSet::new(),
            live_pending: Vec::new(),
            live_flush_at: None,
            live_buffer: Vec::new(),
        }
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut messages: mpsc::UnboundedReceiver<TransportMessage>,
    ) {
        loop {
            let deadline = self.next_deadline();
            tokio::select! {
                biased;
                command = commands.recv() => {
                    let Some(command) = command else {
                        break;
                    };
                    self.handle_command(command);
                }
                Some(message) = messages.recv() => self.handle_message(message),
                () = wait_until(deadline) => self.on_deadline(Instant::now()),
            }
        }

        self.stop();
        tracing::debug!("feed assembler task finished");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Start => self.start(),
            Command::Load { n, done } => {
                if self.status == AssemblerState::Stopped {
                    let _ = done.send(());
                    return;
                }
                self.start();
                self.pending_loads.push_back((n, done));
                self.drain_loads();
            }
            Command::LoadBuffer { done } => {
                self.load_buffer();
                let _ = done.send(());
            }
            Command::Stop { done } => {
                self.stop();
                let _ = done.send(());
            }
            Command::Observe {
                mut listener,
                reply,
            } => {
                let id = self
                    .feed
                    .subscribe(move |feed: &Vec<DisplayEvent>| listener(feed.as_slice()));
                let _ = reply.send(id);
            }
            Command::Unobserve { id, reply } => {
                let _ = reply.send(self.feed.unsubscribe(id));
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.feed.get().clone());
            }
            Command::Buffered { reply } => {
                let _ = reply.send(self.live_buffer.len());
            }
            Command::State { reply } => {
                let _ = reply.send(self.status);
            }
        }
    }

    fn handle_message(&mut self, message: TransportMessage) {
        if self.status == AssemblerState::Stopped {
            return;
        }

        match message {
            TransportMessage::Batch {
                subscription,
                events,
            } => match self.subscriptions.get(&subscription).map(|t| t.kind) {
                Some(SubscriptionKind::Live) => self.on_live_batch(events),
                Some(SubscriptionKind::Parents) => {
                    let resolved = events
                        .into_iter()
                        .filter(|event| self.state.resolve(event.clone()))
                        .count();
                    tracing::debug!(%subscription, resolved, "parents resolved");
                }
                Some(SubscriptionKind::History) => {
                    tracing::trace!(%subscription, "history events arrive through the cursor");
                }
                None => {
                    tracing::trace!(%subscription, "ignoring batch for untracked subscription");
                }
            },
            TransportMessage::Closed { subscription } => {
                if let Some(tracked) = self.subscriptions.remove(&subscription) {
                    tracing::debug!(%subscription, kind = ?tracked.kind, "subscription closed");
                }
                if self.barrier.on_closed(subscription) {
                    tracing::debug!("readiness barrier opened");
                    self.drain_loads();
                }
            }
        }
    }

    fn on_deadline(&mut self, now: Instant) {
        if self.status == AssemblerState::Stopped {
            return;
        }

        if self.barrier.on_deadline(now) {
            self.drain_loads();
        }

        if self.live_flush_at.is_some_and(|at| at <= now) {
            self.flush_live();
        }

        let due = self.deferred.take_due(now);
        if !due.is_empty() {
            let passes = self.passes();
            let released = self
                .deferred
                .run(due, &passes, |id| self.state.contains(id), now);
            self.commit(released);
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        [
            self.barrier.deadline(),
            self.live_flush_at,
            self.deferred.next_due(),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    // ==================== Lifecycle ====================

    fn start(&mut self) {
        if self.status != AssemblerState::Idle {
            return;
        }
        self.status = AssemblerState::Active;
        tracing::info!(
            relays = self.request.relays.len(),
            filters = self.request.filters.len(),
            "starting feed assembler"
        );

        if !self.request.has_upper_bound() {
            let live = Request::new(
                self.request.relays.clone(),
                live_filters(&self.request.filters, Timestamp::now()),
            );
            let handle = self.transport.subscribe(&live, self.sink.clone());
            self.track(handle, SubscriptionKind::Live);
        }

        let mut cursor = self.transport.cursor(&self.request, self.sink.clone());
        let handles = cursor.load(self.config.page_size);
        self.cursor = Some(cursor);

        let ids: Vec<SubscriptionId> = handles.iter().map(|handle| handle.id()).collect();
        self.barrier.arm(
            ids,
            self.config.ready_threshold,
            self.config.ready_timeout(),
            Instant::now(),
        );
        for handle in handles {
            self.track(handle, SubscriptionKind::History);
        }
    }

    fn stop(&mut self) {
        if self.status == AssemblerState::Stopped {
            return;
        }
        self.status = AssemblerState::Stopped;

        let closed = self.subscriptions.len();
        for (_, tracked) in self.subscriptions.drain() {
            tracked.handle.close();
        }
        self.cursor = None;
        self.deferred.clear();
        self.live_pending.clear();
        self.live_flush_at = None;
        self.live_buffer.clear();
        for (_, done) in self.pending_loads.drain(..) {
            let _ = done.send(());
        }

        tracing::info!(closed, "feed assembler stopped");
    }

    fn track(&mut self, handle: Box<dyn SubscriptionHandle>, kind: SubscriptionKind) {
        let id = handle.id();
        tracing::debug!(subscription = %id, ?kind, "subscription opened");
        self.subscriptions.insert(id, Tracked { handle, kind });
    }

    // ==================== Historical path ====================

    fn drain_loads(&mut self) {
        if !self.barrier.is_ready() {
            return;
        }
        while let Some((n, done)) = self.pending_loads.pop_front() {
            self.load(n);
            let _ = done.send(());
        }
    }

    fn load(&mut self, n: usize) {
        let Some(cursor) = self.cursor.as_mut() else {
            return;
        };
        let (handles, events) = cursor.take(n);
        for handle in handles {
            self.track(handle, SubscriptionKind::History);
        }

        let accepted = self.discard_events(events);
        self.request_parents(&accepted);

        if !self.config.defer_events {
            self.commit(accepted);
            return;
        }

        let mut pending = self.deferred.take_resolved(|id| self.state.contains(id));
        pending.extend(accepted.into_iter().map(Pending::new));

        let passes = self.passes();
        let released = self
            .deferred
            .run(pending, &passes, |id| self.state.contains(id), Instant::now());
        self.commit(released);
    }

    fn passes(&self) -> DeferralPasses {
        DeferralPasses {
            orphans: self.config.resolve_parents,
            cutoff: ancient_cutoff(&self.request.filters, Timestamp::now()),
            orphan_delay: self.config.orphan_delay(),
            ancient_delay: self.config.ancient_delay(),
        }
    }

    // ==================== Live path ====================

    fn on_live_batch(&mut self, events: Vec<Event>) {
        if events.is_empty() {
            return;
        }
        self.live_pending.extend(events);
        if self.live_pending.len() >= self.config.live_batch_size {
            self.flush_live();
        } else if self.live_flush_at.is_none() {
            self.live_flush_at = Some(deadline_after(Instant::now(), self.config.live_flush()));
        }
    }

    fn flush_live(&mut self) {
        self.live_flush_at = None;
        let events = std::mem::take(&mut self.live_pending);
        if events.is_empty() {
            return;
        }

        let accepted = self.discard_events(events);
        self.request_parents(&accepted);
        tracing::debug!(
            accepted = accepted.len(),
            buffered = self.live_buffer.len() + accepted.len(),
            "buffered live events"
        );
        self.live_buffer.extend(accepted);
    }

    fn load_buffer(&mut self) {
        if self.status == AssemblerState::Stopped {
            return;
        }
        self.flush_live();
        if self.live_buffer.is_empty() {
            return;
        }
        let events = std::mem::take(&mut self.live_buffer);
        self.commit(events);
    }

    // ==================== Shared steps ====================

    fn discard_events(&self, events: Vec<Event>) -> Vec<Event> {
        events
            .into_iter()
            .filter(|event| {
                !(self.mute.is_pubkey_muted(&event.pubkey)
                    || self.mute.is_event_muted(event)
                    || (self.config.hide_replies && event.is_reply()))
            })
            .collect()
    }

    /// Fetches unknown parents of `events` from the configured relays and
    /// the local cache.
    fn request_parents(&mut self, events: &[Event]) {
        if !self.config.resolve_parents {
            return;
        }

        let mut missing: Vec<EventId> = Vec::new();
        for parent in events.iter().filter_map(Event::parent_id) {
            if !self.state.contains(&parent) && self.requested_parents.insert(parent) {
                missing.push(parent);
            }
        }
        if missing.is_empty() {
            return;
        }

        let mut relays = self.request.relays.clone();
        let local = RelayUrl::local_cache();
        if !relays.contains(&local) {
            relays.push(local);
        }

        for chunk in missing.chunks(self.config.parent_batch_size.max(1)) {
            let request = Request::new(
                relays.clone(),
                vec![Filter::new().ids(chunk.iter().copied())],
            );
            tracing::debug!(parents = chunk.len(), "fetching parents");
            let handle = self.transport.fetch(&request, self.sink.clone());
            self.track(handle, SubscriptionKind::Parents);
        }
    }

    fn commit(&mut self, events: Vec<Event>) {
        if events.is_empty() {
            return;
        }
        if self.state.commit(events) {
            self.feed.publish(self.state.materialize());
        }
    }
}

/// Sleeps until `deadline`, or forever when there is none.
async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
