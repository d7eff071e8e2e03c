//! Integration tests for role-based relay routing.
//!
//! Relay lists are ingested from kind 10002 events the way a client would
//! receive them, then each role is queried through the public router API.

mod helpers;

use std::sync::Arc;

use helpers::{event, init_tracing, pubkey, relay, relay_list};
use outbox_core::config::RouterConfig;
use outbox_core::event::Event;
use outbox_core::relay::{
    AnonymousSession, CandidateList, FallbackPolicy, HintRole, NeutralQuality, QualityOracle,
    RelayList, RelayListEntry, RelayListStore, RelayMode, RelayUrl, Router, StatsQualityOracle,
};

// ============================================================================
// Setup
// ============================================================================

fn url(host: &str) -> String {
    format!("wss://{host}.example.com")
}

/// Author 1 reads from `a-read`, writes to `a-write`, does both on `a-both`.
/// Author 2 reads from `b-read`.
fn store() -> RelayListStore {
    let mut store = RelayListStore::new();
    let a = relay_list(
        1,
        1_000,
        &[
            (url("a-read"), Some("read")),
            (url("a-write"), Some("write")),
            (url("a-both"), None),
        ],
    );
    let b = relay_list(2, 1_000, &[(url("b-read"), Some("read"))]);
    assert!(store.ingest(&a).unwrap());
    assert!(store.ingest(&b).unwrap());
    store
}

fn config(policy: FallbackPolicy) -> RouterConfig {
    RouterConfig {
        relay_limit: 10,
        fallback_policy: policy,
        default_relays: vec![relay("default")],
    }
}

fn router(policy: FallbackPolicy) -> Router {
    init_tracing();
    Router::new(
        config(policy),
        Arc::new(store()),
        Arc::new(NeutralQuality),
        Arc::new(AnonymousSession),
    )
}

fn router_with(session: RelayList, quality: Arc<dyn QualityOracle>) -> Router {
    init_tracing();
    Router::new(
        config(FallbackPolicy::None),
        Arc::new(store()),
        quality,
        Arc::new(session),
    )
}

fn user_session() -> RelayList {
    RelayList::new(
        vec![RelayListEntry {
            url: relay("mine"),
            read: true,
            write: true,
        }],
        1_000,
    )
}

fn hosts(urls: &[RelayUrl]) -> Vec<&str> {
    urls.iter()
        .map(|url| url.host().trim_end_matches(".example.com"))
        .collect()
}

fn marked_reply(author: u64, root_hint: &str, parent_hint: &str) -> Event {
    event(
        50,
        author,
        1,
        2_000,
        vec![
            vec![
                "e".to_string(),
                helpers::event_id(10).to_hex(),
                root_hint.to_string(),
                "root".to_string(),
            ],
            vec![
                "e".to_string(),
                helpers::event_id(11).to_hex(),
                parent_hint.to_string(),
                "reply".to_string(),
            ],
        ],
    )
}

// ============================================================================
// Relay list ingestion
// ============================================================================

#[test]
fn newer_relay_list_replaces_older() {
    let mut store = store();
    let newer = relay_list(1, 2_000, &[(url("moved"), None)]);
    let older = relay_list(1, 500, &[(url("stale"), None)]);

    assert!(store.ingest(&newer).unwrap());
    assert!(!store.ingest(&older).unwrap());

    let router = Router::new(
        config(FallbackPolicy::None),
        Arc::new(store),
        Arc::new(NeutralQuality),
        Arc::new(AnonymousSession),
    );
    let hints = router.pubkey_hints(&pubkey(1), RelayMode::Read, None);
    assert_eq!(hosts(&hints), vec!["moved"]);
}

#[test]
fn non_relay_list_event_is_rejected() {
    let mut store = RelayListStore::new();
    let note = event(1, 1, 1, 1_000, vec![vec!["r".to_string(), url("a")]]);
    assert!(store.ingest(&note).is_err());
    assert!(store.is_empty());
}

#[test]
fn unshareable_relays_never_leave_the_router() {
    let mut store = RelayListStore::new();
    let list = relay_list(
        1,
        1_000,
        &[
            ("ws://localhost:7777", None),
            ("ws://127.0.0.1", None),
            ("wss://public.example.com", None),
        ],
    );
    store.ingest(&list).unwrap();
    let router = Router::new(
        config(FallbackPolicy::None),
        Arc::new(store),
        Arc::new(NeutralQuality),
        Arc::new(AnonymousSession),
    );

    let hints = router.pubkey_hints(&pubkey(1), RelayMode::Write, None);
    assert_eq!(hosts(&hints), vec!["public"]);
}

#[test]
fn unknown_marker_keeps_the_rest_of_the_list() {
    let mut store = RelayListStore::new();
    let list = relay_list(
        1,
        100,
        &[
            ("wss://good.example.com", None),
            ("wss://odd.example.com", Some("inbox")),
        ],
    );
    assert!(store.ingest(&list).unwrap());
    let router = Router::new(
        config(FallbackPolicy::None),
        Arc::new(store),
        Arc::new(NeutralQuality),
        Arc::new(AnonymousSession),
    );

    let read = router.pubkey_hints(&pubkey(1), RelayMode::Read, None);
    let write = router.pubkey_hints(&pubkey(1), RelayMode::Write, None);
    assert_eq!(hosts(&read), vec!["good", "odd"]);
    assert_eq!(hosts(&write), vec!["good", "odd"]);
}

#[test]
fn malformed_hosts_are_dropped_from_relay_lists() {
    let mut store = RelayListStore::new();
    let list = relay_list(
        1,
        100,
        &[
            ("wss://re|ay.example.com", None),
            ("wss://relay.example.com\"><x>", None),
            ("wss://good.example.com", None),
        ],
    );
    store.ingest(&list).unwrap();
    let router = Router::new(
        config(FallbackPolicy::None),
        Arc::new(store),
        Arc::new(NeutralQuality),
        Arc::new(AnonymousSession),
    );

    let hints = router.pubkey_hints(&pubkey(1), RelayMode::Read, None);
    assert_eq!(hosts(&hints), vec!["good"]);
}

// ============================================================================
// Roles
// ============================================================================

#[test]
fn pubkey_hints_follow_mode() {
    let router = router(FallbackPolicy::None);

    let read = router.pubkey_hints(&pubkey(1), RelayMode::Read, None);
    let write = router.pubkey_hints(&pubkey(1), RelayMode::Write, None);

    assert_eq!(hosts(&read), vec!["a-read", "a-both"]);
    assert_eq!(hosts(&write), vec!["a-write", "a-both"]);
}

#[test]
fn event_hints_use_author_outbox_then_seen_on() {
    let router = router(FallbackPolicy::None);
    let note = event(5, 1, 1, 2_000, Vec::new()).seen_on_relay(relay("seen"));

    let hints = router.event_hints(&note, None);
    assert_eq!(hosts(&hints), vec!["a-write", "a-both", "seen"]);
}

#[test]
fn reply_hints_use_author_inbox() {
    let router = router(FallbackPolicy::None);
    let note = event(5, 2, 1, 2_000, Vec::new());

    assert_eq!(hosts(&router.reply_hints(&note, None)), vec!["b-read"]);
}

#[test]
fn thread_hints_prefer_tag_hint() {
    let router = router(FallbackPolicy::None);
    let reply = marked_reply(1, &url("root"), &url("hint"));

    assert_eq!(
        hosts(&router.parent_hints(&reply, None)),
        vec!["hint", "a-read", "a-both"]
    );
    assert_eq!(
        hosts(&router.root_hints(&reply, None)),
        vec!["root", "a-read", "a-both"]
    );
}

#[test]
fn invalid_tag_hint_is_skipped() {
    let router = router(FallbackPolicy::None);
    let reply = marked_reply(2, "", "not a url");

    assert_eq!(hosts(&router.parent_hints(&reply, None)), vec!["b-read"]);
    assert_eq!(hosts(&router.root_hints(&reply, None)), vec!["b-read"]);
}

#[test]
fn publish_hints_reach_tagged_inboxes_and_outboxes() {
    let router = router_with(user_session(), Arc::new(NeutralQuality));
    let mention = event(
        7,
        1,
        1,
        2_000,
        vec![vec!["p".to_string(), pubkey(2).to_hex()]],
    );

    let hints = router.publish_hints(&mention, None);
    let hosts = hosts(&hints);

    for expected in ["b-read", "a-write", "a-both", "mine"] {
        assert!(hosts.contains(&expected), "missing {expected} in {hosts:?}");
    }
    assert!(!hosts.contains(&"a-read"));
}

#[test]
fn inbox_hints_rank_shared_relays_first() {
    let mut store = RelayListStore::new();
    for (author, extra) in [(1, "only-1"), (2, "only-2"), (3, "only-3")] {
        let list = relay_list(
            author,
            1_000,
            &[(url(extra), Some("read")), (url("shared"), Some("read"))],
        );
        store.ingest(&list).unwrap();
    }
    let router = Router::new(
        config(FallbackPolicy::None),
        Arc::new(store),
        Arc::new(NeutralQuality),
        Arc::new(AnonymousSession),
    );

    let hints = router.inbox_hints(&[pubkey(1), pubkey(2), pubkey(3)], Some(2));
    assert_eq!(hints.len(), 2);
    assert_eq!(hosts(&hints)[0], "shared");
}

#[test]
fn merge_and_select_ignores_empty_lists() {
    let router = router(FallbackPolicy::None);
    let lists = vec![
        CandidateList::new(HintRole::AuthorRead, Vec::new()),
        CandidateList::new(HintRole::AuthorWrite, vec![relay("x")]),
        CandidateList::new(HintRole::UserWrite, Vec::new()),
    ];

    let hints = router.merge_and_select(lists, RelayMode::Write, None);
    assert_eq!(hosts(&hints), vec!["x"]);
}

// ============================================================================
// Limits, quality and fallbacks
// ============================================================================

#[test]
fn explicit_limit_caps_output() {
    let router = router(FallbackPolicy::Maximal);
    let hints = router.pubkey_hints(&pubkey(1), RelayMode::Read, Some(1));
    assert_eq!(hosts(&hints), vec!["a-read"]);
}

#[test]
fn low_quality_relays_rank_last() {
    let mut oracle = StatsQualityOracle::new().at(10_000);
    oracle.record_error(&relay("a-read"), 9_990);

    let router = router_with(user_session(), Arc::new(oracle));
    let hints = router.pubkey_hints(&pubkey(1), RelayMode::Read, None);

    assert_eq!(hosts(&hints), vec!["a-both", "a-read"]);
}

#[test]
fn minimal_fallback_only_when_empty() {
    let router = router(FallbackPolicy::Minimal);

    let unknown = router.pubkey_hints(&pubkey(9), RelayMode::Read, None);
    assert_eq!(hosts(&unknown), vec!["default"]);

    let known = router.pubkey_hints(&pubkey(1), RelayMode::Read, None);
    assert_eq!(hosts(&known), vec!["a-read", "a-both"]);
}

#[test]
fn maximal_fallback_fills_to_limit() {
    let router = Router::new(
        RouterConfig {
            relay_limit: 4,
            fallback_policy: FallbackPolicy::Maximal,
            default_relays: vec![relay("default"), relay("a-read"), relay("spare")],
        },
        Arc::new(store()),
        Arc::new(NeutralQuality),
        Arc::new(user_session()),
    );

    let hints = router.pubkey_hints(&pubkey(1), RelayMode::Read, None);
    assert_eq!(hosts(&hints), vec!["a-read", "a-both", "mine", "default"]);
}

#[test]
fn no_fallback_policy_can_return_nothing() {
    let router = router(FallbackPolicy::None);
    assert!(router
        .pubkey_hints(&pubkey(9), RelayMode::Read, None)
        .is_empty());
}

#[test]
fn router_config_loads_from_json() {
    let config: RouterConfig = serde_json::from_str(
        r#"{"relay_limit": 3, "fallback_policy": "maximal", "default_relays": ["wss://default.example.com"]}"#,
    )
    .unwrap();

    assert_eq!(config.relay_limit, 3);
    assert_eq!(config.fallback_policy, FallbackPolicy::Maximal);
    assert_eq!(config.default_relays, vec![relay("default")]);
}
