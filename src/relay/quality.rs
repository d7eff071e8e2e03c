//! Relay quality signals.
//!
//! The selector asks a [`QualityOracle`] for a score in `[0, 1]` per relay.
//! Relays scoring below [`LOW_QUALITY_THRESHOLD`] are still usable but are
//! only picked after every healthy candidate. An absent score means the
//! relay is unknown and is treated as healthy.

use std::collections::HashMap;

use super::url::RelayUrl;

/// Scores below this mark a relay as low quality.
pub const LOW_QUALITY_THRESHOLD: f64 = 0.6;

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;

/// Provides a quality score for a relay.
pub trait QualityOracle: Send + Sync {
    /// Quality in `[0, 1]`, or `None` when nothing is known.
    fn quality(&self, url: &RelayUrl) -> Option<f64>;

    /// Returns true if the relay should be ranked after healthy ones.
    fn is_low_quality(&self, url: &RelayUrl) -> bool {
        self.quality(url)
            .is_some_and(|score| score < LOW_QUALITY_THRESHOLD)
    }
}

impl<F> QualityOracle for F
where
    F: Fn(&RelayUrl) -> Option<f64> + Send + Sync,
{
    fn quality(&self, url: &RelayUrl) -> Option<f64> {
        self(url)
    }
}

/// An oracle that knows nothing; every relay is healthy.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeutralQuality;

impl QualityOracle for NeutralQuality {
    fn quality(&self, _url: &RelayUrl) -> Option<f64> {
        None
    }
}

/// Observed behaviour of one relay.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayStats {
    /// Unix timestamps of recent connection or protocol errors.
    pub recent_errors: Vec<u64>,
    /// Whether a connection is currently open and healthy.
    pub connected: bool,
}

impl RelayStats {
    fn errors_since(&self, since: u64) -> usize {
        self.recent_errors.iter().filter(|&&at| at > since).count()
    }
}

/// Scores relays from recorded errors and connection state.
///
/// | Condition                       | Score |
/// |---------------------------------|-------|
/// | not shareable                   | 0.0   |
/// | any error in the last minute    | 0.0   |
/// | more than 3 in the last hour    | 0.5   |
/// | more than 10 in the last day    | 0.7   |
/// | connected                       | 1.0   |
/// | known, not connected            | 0.8   |
/// | unknown                         | none  |
#[derive(Debug, Clone, Default)]
pub struct StatsQualityOracle {
    stats: HashMap<RelayUrl, RelayStats>,
    now: Option<u64>,
}

impl StatsQualityOracle {
    /// Creates an oracle with no recorded stats.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pins the clock used for error windows.
    #[must_use]
    pub const fn at(mut self, now: u64) -> Self {
        self.now = Some(now);
        self
    }

    /// Records an error observed at `at` (Unix seconds).
    pub fn record_error(&mut self, url: &RelayUrl, at: u64) {
        let stats = self.stats.entry(url.clone()).or_default();
        stats.recent_errors.push(at);
        // Nothing older than a day affects the score.
        let cutoff = at.saturating_sub(DAY);
        stats.recent_errors.retain(|&error| error > cutoff);
    }

    /// Records the current connection state.
    pub fn record_connected(&mut self, url: &RelayUrl, connected: bool) {
        self.stats.entry(url.clone()).or_default().connected = connected;
    }

    /// Returns the stats recorded for a relay.
    #[must_use]
    pub fn stats(&self, url: &RelayUrl) -> Option<&RelayStats> {
        self.stats.get(url)
    }

    fn now(&self) -> u64 {
        self.now
            .unwrap_or_else(|| nostr::Timestamp::now().as_u64())
    }
}

impl QualityOracle for StatsQualityOracle {
    fn quality(&self, url: &RelayUrl) -> Option<f64> {
        if !url.is_shareable() {
            return Some(0.0);
        }

        let stats = self.stats.get(url)?;
        let now = self.now();

        if stats.errors_since(now.saturating_sub(MINUTE)) > 0 {
            return Some(0.0);
        }
        if stats.errors_since(now.saturating_sub(HOUR)) > 3 {
            return Some(0.5);
        }
        if stats.errors_since(now.saturating_sub(DAY)) > 10 {
            return Some(0.7);
        }

        Some(if stats.connected { 1.0 } else { 0.8 })
    }
}
