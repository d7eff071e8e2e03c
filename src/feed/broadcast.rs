//! In-process value broadcaster.
//!
//! Stores the last published value and calls every registered listener
//! synchronously on each publish. A new listener is called with the current
//! value as soon as it registers.

use std::fmt;

/// Identifies a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener<T> = Box<dyn FnMut(&T) + Send>;

/// Holds a current value and notifies listeners when it changes.
pub struct Broadcaster<T> {
    value: T,
    listeners: Vec<(ListenerId, Listener<T>)>,
    next_id: u64,
}

impl<T: fmt::Debug> fmt::Debug for Broadcaster<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Broadcaster")
            .field("value", &self.value)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl<T> Broadcaster<T> {
    /// Creates a broadcaster holding `initial`.
    #[must_use]
    pub const fn new(initial: T) -> Self {
        Self {
            value: initial,
            listeners: Vec::new(),
            next_id: 0,
        }
    }

    /// The last published value.
    #[must_use]
    pub const fn get(&self) -> &T {
        &self.value
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Registers a listener and calls it with the current value.
    pub fn subscribe(&mut self, mut listener: impl FnMut(&T) + Send + 'static) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        listener(&self.value);
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Removes a listener. Returns false if it was not registered.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        self.listeners.len() != before
    }

    /// Stores `value` and calls every listener with it.
    pub fn publish(&mut self, value: T) {
        self.value = value;
        for (_, listener) in &mut self.listeners {
            listener(&self.value);
        }
    }
}
