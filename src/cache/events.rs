//! Update notifications
//!
//! A cache set owns a list of listeners and calls each of them, in
//! registration order, once per batch of stored properties that changed
//! at least one entry.

use std::collections::{HashMap, HashSet};

/// Batch of entries whose cached properties changed
#[derive(Debug, Clone)]
pub struct UpdateEvent<E> {
    /// Changed entries, in the order they were stored
    pub entries: Vec<E>,
    /// Changed entries by cache key
    pub entries_map: HashMap<String, E>,
    /// Every property name that was part of the batch, changed or not
    pub names: HashSet<String>,
}

/// Handle returned by `on_update`, used to remove the listener again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener<E> = Box<dyn Fn(&UpdateEvent<E>) + Send + Sync>;

/// Registered update listeners
pub(crate) struct Listeners<E> {
    next_id: u64,
    listeners: Vec<(ListenerId, Listener<E>)>,
}

impl<E> Listeners<E> {
    pub(crate) fn new() -> Self {
        Self {
            next_id: 1,
            listeners: Vec::new(),
        }
    }

    pub(crate) fn add<F>(&mut self, listener: F) -> ListenerId
    where
        F: Fn(&UpdateEvent<E>) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub(crate) fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        self.listeners.len() != before
    }

    pub(crate) fn dispatch(&self, event: &UpdateEvent<E>) {
        for (_, listener) in &self.listeners {
            listener(event);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.listeners.len()
    }
}
