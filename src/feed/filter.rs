//! Filter analysis for feed assembly.
//!
//! A filter that names specific events or a handful of authors matches few
//! events, so a relay may legitimately return results from far back in
//! time. A broad filter (a global feed) produces plenty of recent results,
//! and old events arriving late are most likely a relay dumping its backlog.
//! [`estimate_time_span`] turns that intuition into the window used by the
//! ancient-event deferral pass.

use nostr::{Alphabet, Filter, SingleLetterTag, Timestamp};

const DAY_SECS: f64 = 86_400.0;
const AUTHOR_SATURATION: f64 = 300.0;
const MIN_SPAN_FRACTION: f64 = 0.01;

/// How broad a single filter is, in `[0, 1]`.
///
/// | Filter shape                       | Generality          |
/// |------------------------------------|---------------------|
/// | `ids`, `#e` or `#a`                | 0                   |
/// | `authors` plus any tag constraint  | 0.2                 |
/// | `authors` only                     | min(1, authors/300) |
/// | anything else                      | 1                   |
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn filter_generality(filter: &Filter) -> f64 {
    let event_tag = SingleLetterTag::lowercase(Alphabet::E);
    let address_tag = SingleLetterTag::lowercase(Alphabet::A);

    if filter.ids.is_some()
        || filter.generic_tags.contains_key(&event_tag)
        || filter.generic_tags.contains_key(&address_tag)
    {
        return 0.0;
    }

    let authors = filter.authors.as_ref().map_or(0, std::collections::BTreeSet::len);
    if authors == 0 {
        return 1.0;
    }
    if filter.generic_tags.is_empty() {
        (authors as f64 / AUTHOR_SATURATION).min(1.0)
    } else {
        0.2
    }
}

/// Estimates how far back in time results for `filters` plausibly reach.
///
/// Returns `round(86400 × max(0.01, 1 − mean generality))` seconds, so the
/// span is between roughly 15 minutes and one day.
///
/// # Example
///
/// ```
/// use nostr::{Filter, Kind};
/// use outbox_core::feed::estimate_time_span;
///
/// // A global feed only looks back 1% of a day.
/// assert_eq!(estimate_time_span(&[Filter::new().kind(Kind::TextNote)]), 864);
/// ```
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn estimate_time_span(filters: &[Filter]) -> u64 {
    let mean = if filters.is_empty() {
        1.0
    } else {
        filters.iter().map(filter_generality).sum::<f64>() / filters.len() as f64
    };
    (DAY_SECS * (1.0 - mean).max(MIN_SPAN_FRACTION)).round() as u64
}

/// Oldest creation time that is not considered ancient at `now`.
#[must_use]
pub fn ancient_cutoff(filters: &[Filter], now: Timestamp) -> Timestamp {
    Timestamp::from(now.as_u64().saturating_sub(estimate_time_span(filters)))
}

/// Derives live-subscription filters: same constraints, starting at `now`,
/// with no upper bound or limit.
#[must_use]
pub fn live_filters(filters: &[Filter], now: Timestamp) -> Vec<Filter> {
    filters
        .iter()
        .cloned()
        .map(|mut filter| {
            filter.since = Some(now);
            filter.until = None;
            filter.limit = None;
            filter
        })
        .collect()
}
