//! Relay routing.
//!
//! Decides which relays to talk to for a given read or write operation.
//! Nothing here opens connections; the output is always a bounded list of
//! normalized relay URLs that a transport can use.
//!
//! # Architecture
//!
//! ```text
//! Router role (pubkey, event, parent, publish, ...)
//!     │
//!     ▼
//! candidate generators (RelayDirectory, Session, tag hints, seen-on)
//!     │
//!     ▼
//! merge_hints (multi-source roles only)
//!     │
//!     ▼
//! RelaySelector (dedupe, shareability, QualityOracle, limit)
//!     │
//!     ▼
//! FallbackPolicy (session relays, then defaults)
//! ```
//!
//! # URL Policy
//!
//! | Check                 | Effect                         |
//! |-----------------------|--------------------------------|
//! | fails to normalize    | dropped silently               |
//! | not shareable         | dropped silently               |
//! | quality below 0.6     | used only after healthy relays |
//! | unknown quality       | treated as healthy             |

mod directory;
mod error;
mod quality;
mod router;
mod scoring;
mod selector;
mod types;
mod url;

pub use directory::{AnonymousSession, RelayDirectory, RelayListStore, Session};
pub use error::{RelayError, RelayResult};
pub use quality::{
    NeutralQuality, QualityOracle, RelayStats, StatsQualityOracle, LOW_QUALITY_THRESHOLD,
};
pub use router::Router;
pub use scoring::{lists_for_role, merge_hints, score_hints, ScoredHint};
pub use selector::RelaySelector;
pub use types::{
    CandidateList, FallbackPolicy, HintRole, RelayList, RelayListEntry, RelayMode,
    KIND_RELAY_LIST,
};
pub use url::{parse_all, RelayUrl, LOCAL_RELAY_URL};
