//! Role-specific relay selection.
//!
//! Each role (reading an author, finding an event's parent, publishing,
//! ...) draws candidates from a fixed, documented sequence of sources and
//! hands them to the [`RelaySelector`]. Single-source roles are lazy
//! iterator chains; multi-source roles merge their lists with
//! [`merge_hints`] first.
//!
//! | Role    | Candidate sources, in order                                  |
//! |---------|--------------------------------------------------------------|
//! | pubkey  | the pubkey's relays for the requested mode                   |
//! | event   | author's write relays, then relays the event was seen on      |
//! | reply   | author's read relays                                         |
//! | parent  | relay hint in the parent tag, then author's read relays      |
//! | root    | relay hint in the root tag, then author's read relays        |
//! | publish | merge of: each tagged pubkey's read relays, author's write    |
//! |         | relays, user's write relays                                  |
//! | inbox   | merge of each pubkey's read relays                           |
//!
//! After selection the [`FallbackPolicy`](super::FallbackPolicy) may top the
//! result up with the user's relays and then the configured defaults.

use std::iter;
use std::sync::Arc;

use nostr::PublicKey;

use super::directory::{RelayDirectory, Session};
use super::quality::QualityOracle;
use super::scoring::{lists_for_role, merge_hints};
use super::selector::RelaySelector;
use super::types::{CandidateList, HintRole, RelayMode};
use super::url::{parse_all, RelayUrl};
use crate::config::RouterConfig;
use crate::event::Event;

/// Chooses relays for each read/write role.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use outbox_core::config::RouterConfig;
/// use outbox_core::relay::{AnonymousSession, NeutralQuality, RelayListStore, Router};
///
/// let router = Router::new(
///     RouterConfig::default(),
///     Arc::new(RelayListStore::new()),
///     Arc::new(NeutralQuality),
///     Arc::new(AnonymousSession),
/// );
/// assert!(router.inbox_hints(&[], None).len() <= router.relay_limit());
/// ```
#[derive(Clone)]
pub struct Router {
    config: RouterConfig,
    selector: RelaySelector,
    directory: Arc<dyn RelayDirectory>,
    session: Arc<dyn Session>,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("config", &self.config)
            .field("selector", &self.selector)
            .finish_non_exhaustive()
    }
}

impl Router {
    /// Creates a router from its collaborators.
    #[must_use]
    pub fn new(
        config: RouterConfig,
        directory: Arc<dyn RelayDirectory>,
        quality: Arc<dyn QualityOracle>,
        session: Arc<dyn Session>,
    ) -> Self {
        let selector = RelaySelector::new(quality, config.relay_limit);
        Self {
            config,
            selector,
            directory,
            session,
        }
    }

    /// The default number of relays returned per role.
    #[must_use]
    pub const fn relay_limit(&self) -> usize {
        self.config.relay_limit
    }

    /// The underlying selector.
    #[must_use]
    pub const fn selector(&self) -> &RelaySelector {
        &self.selector
    }

    // ==================== Roles ====================

    /// Relays a pubkey advertises for `mode`.
    #[must_use]
    pub fn pubkey_hints(
        &self,
        pubkey: &PublicKey,
        mode: RelayMode,
        limit: Option<usize>,
    ) -> Vec<RelayUrl> {
        self.finish(self.advertised(pubkey, mode), mode, limit)
    }

    /// Relays likely to hold `event`.
    #[must_use]
    pub fn event_hints(&self, event: &Event, limit: Option<usize>) -> Vec<RelayUrl> {
        let candidates = self
            .advertised(&event.pubkey, RelayMode::Write)
            .chain(seen_on_list(event).urls);
        self.finish(candidates, RelayMode::Read, limit)
    }

    /// Relays likely to hold replies to `event`.
    #[must_use]
    pub fn reply_hints(&self, event: &Event, limit: Option<usize>) -> Vec<RelayUrl> {
        self.finish(
            self.advertised(&event.pubkey, RelayMode::Read),
            RelayMode::Read,
            limit,
        )
    }

    /// Relays likely to hold the parent of `event`.
    #[must_use]
    pub fn parent_hints(&self, event: &Event, limit: Option<usize>) -> Vec<RelayUrl> {
        let thread = event.thread();
        let candidates = tag_hint_list(thread.parent_hint())
            .urls
            .into_iter()
            .chain(self.advertised(&event.pubkey, RelayMode::Read));
        self.finish(candidates, RelayMode::Read, limit)
    }

    /// Relays likely to hold the thread root of `event`.
    #[must_use]
    pub fn root_hints(&self, event: &Event, limit: Option<usize>) -> Vec<RelayUrl> {
        let thread = event.thread();
        let candidates = tag_hint_list(thread.root_hint())
            .urls
            .into_iter()
            .chain(self.advertised(&event.pubkey, RelayMode::Read));
        self.finish(candidates, RelayMode::Read, limit)
    }

    /// Relays to publish `event` to so its author's followers and every
    /// tagged pubkey can see it.
    #[must_use]
    pub fn publish_hints(&self, event: &Event, limit: Option<usize>) -> Vec<RelayUrl> {
        let mut lists: Vec<CandidateList> = event
            .tagged_pubkeys()
            .iter()
            .map(|pubkey| {
                CandidateList::new(
                    HintRole::AuthorRead,
                    self.directory.relays_for(pubkey, RelayMode::Read),
                )
            })
            .collect();
        lists.push(CandidateList::new(
            HintRole::AuthorWrite,
            self.directory.relays_for(&event.pubkey, RelayMode::Write),
        ));
        lists.push(CandidateList::new(
            HintRole::UserWrite,
            self.session.user_relays(RelayMode::Write),
        ));

        self.merge_and_select(lists, RelayMode::Write, limit)
    }

    /// Relays where the given pubkeys read (their inboxes).
    #[must_use]
    pub fn inbox_hints(&self, pubkeys: &[PublicKey], limit: Option<usize>) -> Vec<RelayUrl> {
        let groups = pubkeys
            .iter()
            .map(|pubkey| self.directory.relays_for(pubkey, RelayMode::Read))
            .collect();

        self.merge_and_select(lists_for_role(HintRole::AuthorRead, groups), RelayMode::Read, limit)
    }

    /// Merges arbitrary candidate lists and selects from the result.
    #[must_use]
    pub fn merge_and_select(
        &self,
        lists: Vec<CandidateList>,
        mode: RelayMode,
        limit: Option<usize>,
    ) -> Vec<RelayUrl> {
        // Empty lists would only dilute the agreement term.
        let lists: Vec<CandidateList> = lists.into_iter().filter(|l| !l.is_empty()).collect();
        self.finish(merge_hints(&lists, None), mode, limit)
    }

    // ==================== Internals ====================

    /// Lazily yields a pubkey's relays; the directory is only consulted
    /// if the selector pulls this far.
    fn advertised<'a>(
        &'a self,
        pubkey: &'a PublicKey,
        mode: RelayMode,
    ) -> impl Iterator<Item = RelayUrl> + 'a {
        iter::once_with(move || self.directory.relays_for(pubkey, mode)).flatten()
    }

    fn finish<I>(&self, candidates: I, mode: RelayMode, limit: Option<usize>) -> Vec<RelayUrl>
    where
        I: IntoIterator<Item = RelayUrl>,
    {
        let limit = limit.unwrap_or(self.config.relay_limit);
        let mut selected = self.selector.select(candidates, Some(limit));

        let wanted = self
            .config
            .fallback_policy
            .fallback_count(selected.len(), limit);
        if wanted == 0 {
            return selected;
        }

        let already = selected.clone();
        let fallbacks = self
            .fallback_lists(mode)
            .into_iter()
            .flat_map(|list| list.urls)
            .filter(|url| !already.contains(url));
        let extra = self.selector.select(fallbacks, Some(wanted));

        tracing::debug!(
            selected = selected.len(),
            fallbacks = extra.len(),
            "topping up relay selection"
        );
        selected.extend(extra);
        selected
    }

    /// Fallback sources for `mode`, in the order they are drawn from.
    fn fallback_lists(&self, mode: RelayMode) -> [CandidateList; 2] {
        [
            CandidateList::new(HintRole::user(mode), self.session.user_relays(mode)),
            CandidateList::new(HintRole::Default, self.config.default_relays.clone()),
        ]
    }
}

fn seen_on_list(event: &Event) -> CandidateList {
    CandidateList::new(HintRole::SeenOn, event.seen_on.iter().cloned().collect())
}

fn tag_hint_list(hint: Option<&str>) -> CandidateList {
    CandidateList::new(HintRole::TagHint, parse_all(hint).collect())
}
