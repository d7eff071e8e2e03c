//! Runtime configuration.
//!
//! Configuration is plain data: a [`CoreConfig`] holds the routing and feed
//! settings, every field has a default, and the whole structure can be
//! loaded from JSON. Durations are stored in milliseconds so the JSON stays
//! readable, and exposed as [`Duration`] through accessor methods.
//!
//! # Example
//!
//! ```
//! use outbox_core::config::CoreConfig;
//!
//! let config = CoreConfig::from_json_str(r#"{ "router": { "relay_limit": 5 } }"#).unwrap();
//! assert_eq!(config.router.relay_limit, 5);
//! assert_eq!(config.feed.page_size, 50);
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::relay::{FallbackPolicy, RelayUrl};

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file could not be read.
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration is not valid JSON for the expected shape.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// A value is outside its allowed range.
    #[error("Invalid config value for {field}: {reason}")]
    Invalid {
        /// The offending field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Complete configuration for routing and feed assembly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Relay routing settings.
    pub router: RouterConfig,
    /// Feed assembly settings.
    pub feed: FeedConfig,
}

impl CoreConfig {
    /// Parses and validates configuration from a JSON string.
    ///
    /// Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or a value is out of range.
    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is malformed, or holds
    /// an out-of-range value.
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&json)?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Checks every value is within its allowed range.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> ConfigResult<()> {
        self.router.validate()?;
        self.feed.validate()
    }
}

/// Relay routing settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Default number of relays returned per role.
    pub relay_limit: usize,
    /// How many fallback relays to add after selection.
    pub fallback_policy: FallbackPolicy,
    /// Relays used as the last fallback source.
    pub default_relays: Vec<RelayUrl>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            relay_limit: 10,
            fallback_policy: FallbackPolicy::default(),
            default_relays: Vec::new(),
        }
    }
}

impl RouterConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.relay_limit == 0 {
            return Err(invalid("router.relay_limit", "must be greater than zero"));
        }
        Ok(())
    }
}

/// Longest accepted value for any feed delay, one day.
pub const MAX_DELAY_MS: u64 = 86_400_000;

/// Feed assembly settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Events requested by the initial page.
    pub page_size: usize,
    /// Fraction of the initial page's sub-requests that must close before
    /// the first load commits, in `(0, 1]`.
    pub ready_threshold: f64,
    /// Upper bound on waiting for the readiness barrier.
    pub ready_timeout_ms: u64,
    /// Maximum live events per coalesced batch.
    pub live_batch_size: usize,
    /// Longest a live event waits before its batch is processed.
    pub live_flush_ms: u64,
    /// Maximum ids per parent fetch request.
    pub parent_batch_size: usize,
    /// Fetch unknown parents of replies.
    pub resolve_parents: bool,
    /// Hold back orphans and backlog events before committing them.
    pub defer_events: bool,
    /// Drop replies instead of showing them.
    pub hide_replies: bool,
    /// Delay before a deferred orphan is retried.
    pub orphan_delay_ms: u64,
    /// Delay before a deferred backlog event is retried.
    pub ancient_delay_ms: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            page_size: 50,
            ready_threshold: 0.2,
            ready_timeout_ms: 3_000,
            live_batch_size: 1_000,
            live_flush_ms: 500,
            parent_batch_size: 100,
            resolve_parents: true,
            defer_events: true,
            hide_replies: false,
            orphan_delay_ms: 1_500,
            ancient_delay_ms: 4_000,
        }
    }
}

impl FeedConfig {
    /// Readiness barrier timeout.
    #[must_use]
    pub const fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }

    /// Live batch flush interval.
    #[must_use]
    pub const fn live_flush(&self) -> Duration {
        Duration::from_millis(self.live_flush_ms)
    }

    /// Orphan retry delay.
    #[must_use]
    pub const fn orphan_delay(&self) -> Duration {
        Duration::from_millis(self.orphan_delay_ms)
    }

    /// Backlog retry delay.
    #[must_use]
    pub const fn ancient_delay(&self) -> Duration {
        Duration::from_millis(self.ancient_delay_ms)
    }

    fn validate(&self) -> ConfigResult<()> {
        if !(self.ready_threshold > 0.0 && self.ready_threshold <= 1.0) {
            return Err(invalid(
                "feed.ready_threshold",
                format!("{} is not in (0, 1]", self.ready_threshold),
            ));
        }
        if self.page_size == 0 {
            return Err(invalid("feed.page_size", "must be greater than zero"));
        }
        if self.live_batch_size == 0 {
            return Err(invalid("feed.live_batch_size", "must be greater than zero"));
        }
        if self.parent_batch_size == 0 {
            return Err(invalid("feed.parent_batch_size", "must be greater than zero"));
        }
        for (field, value) in [
            ("feed.ready_timeout_ms", self.ready_timeout_ms),
            ("feed.live_flush_ms", self.live_flush_ms),
            ("feed.orphan_delay_ms", self.orphan_delay_ms),
            ("feed.ancient_delay_ms", self.ancient_delay_ms),
        ] {
            if value > MAX_DELAY_MS {
                return Err(invalid(
                    field,
                    format!("{value} exceeds the {MAX_DELAY_MS} ms maximum"),
                ));
            }
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}
