//! Relay selection policy.
//!
//! The selector turns a prioritized candidate stream into a bounded relay
//! set. Candidates are pulled lazily: the scan stops as soon as more than
//! `limit` healthy relays are known, so generators may be long or unbounded.

use std::collections::HashSet;
use std::sync::Arc;

use super::quality::QualityOracle;
use super::url::{parse_all, RelayUrl};

/// Applies deduplication, shareability and quality ordering to candidates.
#[derive(Clone)]
pub struct RelaySelector {
    quality: Arc<dyn QualityOracle>,
    default_limit: usize,
}

impl std::fmt::Debug for RelaySelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelaySelector")
            .field("default_limit", &self.default_limit)
            .finish_non_exhaustive()
    }
}

impl RelaySelector {
    /// Creates a selector using `default_limit` when no limit is given.
    #[must_use]
    pub fn new(quality: Arc<dyn QualityOracle>, default_limit: usize) -> Self {
        Self {
            quality,
            default_limit,
        }
    }

    /// The limit applied when callers pass `None`.
    #[must_use]
    pub const fn default_limit(&self) -> usize {
        self.default_limit
    }

    /// Selects up to `limit` relays from prioritized candidates.
    ///
    /// Healthy relays always come before low-quality ones; within each
    /// group the candidate order is preserved. Unshareable and duplicate
    /// candidates are dropped silently.
    pub fn select<I>(&self, candidates: I, limit: Option<usize>) -> Vec<RelayUrl>
    where
        I: IntoIterator<Item = RelayUrl>,
    {
        let limit = limit.unwrap_or(self.default_limit);
        if limit == 0 {
            return Vec::new();
        }

        let mut seen: HashSet<RelayUrl> = HashSet::new();
        let mut ok: Vec<RelayUrl> = Vec::new();
        let mut bad: Vec<RelayUrl> = Vec::new();

        for url in candidates {
            if !seen.insert(url.clone()) {
                continue;
            }
            if !url.is_shareable() {
                tracing::trace!(url = %url, "skipping unshareable relay");
                continue;
            }

            if self.quality.is_low_quality(&url) {
                bad.push(url);
            } else {
                ok.push(url);
            }

            if ok.len() > limit {
                break;
            }
        }

        ok.extend(bad);
        ok.truncate(limit);
        ok
    }

    /// Like [`select`](Self::select), but parses raw strings first.
    pub fn select_raw<I, S>(&self, candidates: I, limit: Option<usize>) -> Vec<RelayUrl>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.select(parse_all(candidates), limit)
    }
}
