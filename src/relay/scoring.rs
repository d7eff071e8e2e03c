//! Rank aggregation over candidate relay lists.
//!
//! Every source that suggests relays (follow lists, tag hints, defaults)
//! produces a best-first list. [`merge_hints`] folds any number of those
//! lists into one ranking that rewards agreement between sources first and
//! position within each source second.
//!
//! For a list of length `L`, the item at position `i` contributes
//! `1 / (i + 1) / L` to its URL's score and `1` to its count. The final
//! weight is
//!
//! ```text
//! weight = ln(lists / count) + ln(1 + exp(-score))
//! ```
//!
//! Smaller weights are better. The first term vanishes for a URL endorsed
//! by every list; the second shrinks as the URL is ranked higher.

use std::collections::HashMap;

use super::types::{CandidateList, HintRole};
use super::url::RelayUrl;

/// Accumulated score for one relay across all merged lists.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScoredHint {
    /// Sum of the positional contributions.
    pub score: f64,
    /// Number of lists the relay appeared in.
    pub count: usize,
}

impl ScoredHint {
    /// Final weight of this hint when `lists` lists were merged.
    ///
    /// Smaller is better.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn weight(&self, lists: usize) -> f64 {
        let agreement = (lists as f64 / self.count.max(1) as f64).ln();
        let rank = (-self.score).exp().ln_1p();
        agreement + rank
    }
}

/// Merges ranked candidate lists into one best-first list.
///
/// Ties keep first-encountered order, which is the earliest list and then
/// the earliest position within it.
///
/// # Example
///
/// ```
/// use outbox_core::relay::{merge_hints, CandidateList, HintRole, RelayUrl};
///
/// let x = RelayUrl::parse("wss://x.example.com").unwrap();
/// let y = RelayUrl::parse("wss://y.example.com").unwrap();
/// let z = RelayUrl::parse("wss://z.example.com").unwrap();
///
/// let merged = merge_hints(
///     &[
///         CandidateList::new(HintRole::AuthorWrite, vec![x.clone(), y.clone(), z.clone()]),
///         CandidateList::new(HintRole::TagHint, vec![x.clone(), z.clone(), y.clone()]),
///     ],
///     None,
/// );
/// assert_eq!(merged[0], x);
/// ```
#[must_use]
pub fn merge_hints(lists: &[CandidateList], limit: Option<usize>) -> Vec<RelayUrl> {
    let scored = score_hints(lists);
    let total = lists.len();

    let mut weighted: Vec<(f64, RelayUrl)> = scored
        .into_iter()
        .map(|(url, hint)| (hint.weight(total), url))
        .collect();

    // Stable sort keeps insertion order for equal weights.
    weighted.sort_by(|a, b| a.0.total_cmp(&b.0));

    weighted
        .into_iter()
        .map(|(_, url)| url)
        .take(limit.unwrap_or(usize::MAX))
        .collect()
}

/// Computes the raw score and count for every URL, in first-seen order.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn score_hints(lists: &[CandidateList]) -> Vec<(RelayUrl, ScoredHint)> {
    let mut order: Vec<RelayUrl> = Vec::new();
    let mut scores: HashMap<RelayUrl, ScoredHint> = HashMap::new();

    for list in lists {
        let len = list.urls.len() as f64;
        for (i, url) in list.urls.iter().enumerate() {
            let entry = scores.entry(url.clone()).or_insert_with(|| {
                order.push(url.clone());
                ScoredHint::default()
            });
            entry.score += 1.0 / (i as f64 + 1.0) / len;
            entry.count += 1;
        }
    }

    order
        .into_iter()
        .map(|url| {
            let hint = scores.get(&url).copied().unwrap_or_default();
            (url, hint)
        })
        .collect()
}

/// Builds one candidate list per input, all tagged with the same role.
#[must_use]
pub fn lists_for_role(role: HintRole, groups: Vec<Vec<RelayUrl>>) -> Vec<CandidateList> {
    groups
        .into_iter()
        .map(|urls| CandidateList::new(role, urls))
        .collect()
}
