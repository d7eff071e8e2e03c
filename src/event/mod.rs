//! Events, thread references and mute rules.
//!
//! The routing and feed layers work on a transport-neutral [`Event`]: the
//! protocol fields plus the set of relays the event was observed on. Thread
//! structure is read from NIP-10 `e` tags by [`ThreadRefs`].
//!
//! # Example
//!
//! ```
//! use outbox_core::event::ThreadRefs;
//!
//! let refs = ThreadRefs::from_tags(&[]);
//! assert!(refs.parent.is_none());
//! ```

mod mute;
mod thread;
mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use mute::{MuteList, MutePredicate, NoMutes};
pub use thread::{EventRef, ThreadRefs};
pub use types::{DisplayEvent, Event, REACTION_KINDS};
