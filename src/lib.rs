//! Outbox Core Library
//!
//! Relay routing and feed assembly for Nostr clients.
//!
//! - [`relay`] decides which relays to use for each read or write role,
//!   merging ranked hint lists and filtering by shareability and quality.
//! - [`feed`] assembles events streaming in from many relays into one
//!   deduplicated, threaded, ordered feed.
//! - [`event`] holds the event model, thread references and mute rules.
//! - [`config`] holds the tunable settings for both.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![deny(unsafe_code)]

pub mod config;
pub mod event;
pub mod feed;
pub mod relay;

pub use config::{ConfigError, CoreConfig, FeedConfig, RouterConfig};
pub use event::{DisplayEvent, Event};
pub use feed::{FeedAssembler, FeedError};
pub use relay::{RelayError, RelayUrl, Router};
