//! Relay URL normalization and shareability checks.
//!
//! Relay URLs arrive from relay lists, tag hints and user input in many
//! cosmetic variants. [`RelayUrl::parse`] folds those variants into one
//! canonical form so that deduplication works on strings, and
//! [`RelayUrl::is_shareable`] decides whether a URL may be used for routing
//! or handed to other users.
//!
//! # Normalization Rules
//!
//! - Trim surrounding whitespace and lowercase everything
//! - Default to `wss://` when no scheme is present
//! - Keep user-info (`user@host`) when it was present
//! - Strip the `#fragment`
//! - Add a trailing slash when there is no path
//! - Reject anything `nostr` does not accept as a websocket URL, and hosts
//!   with characters outside letters, digits, `-`, `.` and `_`
//!
//! # Shareability Rules
//!
//! A URL is shareable only if it:
//! - uses `wss://` and contains exactly one `://`
//! - has a dotted host that is not `localhost`, `.local` or an IPv4 literal
//! - carries no explicit port
//! - contains no whitespace and no `%` (percent-encoded whitespace)
//! - is not a "virtual relay" path smuggling a `npub1`/`nprofile1` identifier

use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::{RelayError, RelayResult};

/// Address the local event cache answers on.
///
/// It is never shareable; the feed assembler adds it to parent lookups so
/// already-cached parents resolve without a network round trip.
pub const LOCAL_RELAY_URL: &str = "local://cache/";

/// Path prefixes used by virtual relays to embed a profile identifier.
const VIRTUAL_RELAY_PREFIXES: &[&str] = &["npub1", "nprofile1"];

/// A normalized relay URL.
///
/// Two URLs that differ only cosmetically (case, missing scheme, missing
/// trailing slash, fragment) normalize to the same value.
///
/// # Example
///
/// ```
/// use outbox_core::relay::RelayUrl;
///
/// let url = RelayUrl::parse("Relay.Example.COM").unwrap();
/// assert_eq!(url.as_str(), "wss://relay.example.com/");
/// assert!(url.is_shareable());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RelayUrl(String);

impl RelayUrl {
    /// Parses and normalizes a relay URL.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::InvalidUrl`] if the input is empty, uses a
    /// non-websocket scheme, has no host, or is not a well-formed websocket
    /// address.
    pub fn parse(input: &str) -> RelayResult<Self> {
        let trimmed = input.trim().to_lowercase();
        if trimmed.is_empty() {
            return Err(RelayError::InvalidUrl("empty relay URL".to_string()));
        }

        if trimmed == LOCAL_RELAY_URL {
            return Ok(Self::local_cache());
        }

        let (scheme, rest) = match trimmed.split_once("://") {
            Some((scheme @ ("ws" | "wss"), rest)) => (scheme, rest),
            Some((scheme, _)) => {
                return Err(RelayError::InvalidUrl(format!(
                    "unsupported scheme {scheme}:// in {input}"
                )))
            }
            None => ("wss", trimmed.as_str()),
        };

        // Drop the fragment, the protocol has no use for it.
        let rest = rest.split('#').next().unwrap_or_default();

        let (authority, path) = match rest.find(['/', '?']) {
            Some(index) => rest.split_at(index),
            None => (rest, ""),
        };

        let host = authority.rsplit('@').next().unwrap_or_default();
        if host.is_empty() || host.starts_with(':') {
            return Err(RelayError::InvalidUrl(format!("missing host in {input}")));
        }
        if !host.chars().all(is_host_char) {
            return Err(RelayError::InvalidUrl(format!("invalid host in {input}")));
        }

        let path = if path.is_empty() {
            "/".to_string()
        } else if path.starts_with('?') {
            format!("/{path}")
        } else {
            path.to_string()
        };

        let normalized = format!("{scheme}://{authority}{path}");

        // Structural validation; our own form keeps user-info and the slash.
        nostr::RelayUrl::parse(&normalized)
            .map_err(|e| RelayError::InvalidUrl(format!("{input}: {e}")))?;

        Ok(Self(normalized))
    }

    /// Returns the local cache address.
    #[must_use]
    pub fn local_cache() -> Self {
        Self(LOCAL_RELAY_URL.to_string())
    }

    /// Returns the URL as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if this is the local cache address.
    #[must_use]
    pub fn is_local_cache(&self) -> bool {
        self.0 == LOCAL_RELAY_URL
    }

    /// Returns the host portion, without user-info or port.
    #[must_use]
    pub fn host(&self) -> &str {
        let authority = self.authority();
        let host = authority.rsplit('@').next().unwrap_or(authority);
        host.split(':').next().unwrap_or(host)
    }

    /// Returns the path, including any query.
    #[must_use]
    pub fn path(&self) -> &str {
        let rest = self.after_scheme();
        rest.find('/').map_or("/", |index| &rest[index..])
    }

    /// Returns true if this URL may be used for routing and shared with others.
    ///
    /// See the module docs for the full rule set. Unshareable URLs are
    /// silently dropped by the selector, never reported as errors.
    #[must_use]
    pub fn is_shareable(&self) -> bool {
        let url = self.as_str();

        if !url.starts_with("wss://") || url.matches("://").count() != 1 {
            return false;
        }

        if url.chars().any(char::is_whitespace) || url.contains('%') {
            return false;
        }

        let host = self.host();
        if !host.contains('.') || host.starts_with('.') || host.ends_with('.') {
            return false;
        }

        if is_local_host(host) || is_ipv4_literal(host) || self.port().is_some() {
            return false;
        }

        !self.is_virtual_relay()
    }

    /// Returns the explicit port, if any.
    fn port(&self) -> Option<&str> {
        let authority = self.authority();
        let host_port = authority.rsplit('@').next().unwrap_or(authority);
        host_port.split_once(':').map(|(_, port)| port)
    }

    fn is_virtual_relay(&self) -> bool {
        self.path().split('/').any(|segment| {
            VIRTUAL_RELAY_PREFIXES
                .iter()
                .any(|prefix| segment.starts_with(prefix))
        })
    }

    fn after_scheme(&self) -> &str {
        self.0
            .split_once("://")
            .map_or(self.0.as_str(), |(_, rest)| rest)
    }

    fn authority(&self) -> &str {
        let rest = self.after_scheme();
        rest.split(['/', '?']).next().unwrap_or(rest)
    }
}

impl fmt::Display for RelayUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RelayUrl {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RelayUrl {
    type Error = RelayError;

    fn try_from(value: String) -> RelayResult<Self> {
        Self::parse(&value)
    }
}

impl From<RelayUrl> for String {
    fn from(url: RelayUrl) -> Self {
        url.0
    }
}

fn is_local_host(host: &str) -> bool {
    host == "localhost" || host.ends_with(".local") || host.ends_with(".localhost")
}

/// Characters allowed in a host and optional port.
fn is_host_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '-' | '.' | '_' | ':' | '[' | ']')
}

fn is_ipv4_literal(host: &str) -> bool {
    let octets: Vec<&str> = host.split('.').collect();
    octets.len() == 4 && octets.iter().all(|octet| octet.parse::<u8>().is_ok())
}

/// Parses every candidate, dropping the ones that fail to normalize.
pub fn parse_all<I, S>(candidates: I) -> impl Iterator<Item = RelayUrl>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    candidates.into_iter().filter_map(|candidate| {
        let parsed = RelayUrl::parse(candidate.as_ref());
        if let Err(ref e) = parsed {
            tracing::trace!(candidate = candidate.as_ref(), error = %e, "dropping relay candidate");
        }
        parsed.ok()
    })
}
