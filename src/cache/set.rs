//! Metadata Cache Set
//!
//! Coordinates the cache items of many entries through one storage: works out
//! which properties still have to be fetched, marks them in flight, applies
//! responses by request epoch, invalidates, and notifies listeners.
//!
//! Lookups that only inspect state (`create_requests`, `has_fresh_cache`,
//! `has_pending_requests`, `invalidate`, `store_properties`) use the storage's
//! `peek`, so they never count as a use for eviction. Only item creation in
//! `start_requests` and reads through `get` do.

use std::collections::{HashMap, HashSet};

use tracing::{debug, trace};

use super::events::{ListenerId, Listeners, UpdateEvent};
use super::item::{MetadataCacheItem, Properties, RequestId};
use super::storage::{CacheStorage, LruCacheStorage, MapCacheStorage};
use crate::config::{CacheConfig, ConfigError};
use crate::entry::Entry;

/// Properties a provider must fetch for one entry
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataRequest<E> {
    pub entry: E,
    pub names: Vec<String>,
}

/// Property cache for a collection of entries
pub struct MetadataCacheSet<E> {
    /// Items by entry URL
    storage: Box<dyn CacheStorage>,
    /// Update listeners
    listeners: Listeners<E>,
}

impl<E: Entry> MetadataCacheSet<E> {
    /// Create a cache set over the given storage
    pub fn new(storage: Box<dyn CacheStorage>) -> Self {
        Self {
            storage,
            listeners: Listeners::new(),
        }
    }

    /// Create a cache set backed by bounded LRU storage
    pub fn with_config(config: &CacheConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(Box::new(LruCacheStorage::with_config(config)?)))
    }

    /// Requests needed to make `names` fresh for `entries`
    ///
    /// Entries without an item need every name. Entries that need nothing
    /// are omitted; the order of the remaining requests follows `entries`.
    pub fn create_requests<S: AsRef<str>>(
        &self,
        entries: &[E],
        names: &[S],
    ) -> Vec<MetadataRequest<E>> {
        let mut requests = Vec::new();
        for entry in entries {
            let key = entry.cache_key();
            let requested = match self.storage.peek(&key) {
                Some(item) => item.create_requests(names),
                None => MetadataCacheItem::new().create_requests(names),
            };
            if !requested.is_empty() {
                requests.push(MetadataRequest {
                    entry: entry.clone(),
                    names: requested,
                });
            }
        }
        requests
    }

    /// Mark the properties of `requests` as in flight at `request_id`
    ///
    /// Items are created for entries seen for the first time.
    pub fn start_requests(&mut self, request_id: RequestId, requests: &[MetadataRequest<E>]) {
        for request in requests {
            let key = request.entry.cache_key();
            if self.storage.peek(&key).is_none() {
                self.storage.put(key.clone().into_owned(), MetadataCacheItem::new());
            }
            if let Some(item) = self.storage.peek_mut(&key) {
                item.start_requests(request_id, &request.names);
            }
        }
        trace!(
            request_id = request_id,
            requests = requests.len(),
            "Started metadata requests"
        );
    }

    /// Apply provider results issued at `request_id`
    ///
    /// `results` pairs with `entries` by position. Fires a single update
    /// event if at least one entry changed and returns whether one did. The
    /// event's `names` is the whole of `names`, not only what changed.
    pub fn store_properties<S: AsRef<str>>(
        &mut self,
        request_id: RequestId,
        entries: &[E],
        results: &[Properties],
        names: &[S],
    ) -> bool {
        let mut changed_entries = Vec::new();
        let mut entries_map = HashMap::new();

        for (entry, result) in entries.iter().zip(results) {
            let key = entry.cache_key();
            let updated = self
                .storage
                .peek_mut(&key)
                .is_some_and(|item| item.store_properties(request_id, result));
            if updated {
                trace!(key = %key, request_id = request_id, "Stored metadata");
                entries_map.insert(key.into_owned(), entry.clone());
                changed_entries.push(entry.clone());
            }
        }

        if changed_entries.is_empty() {
            return false;
        }

        let event = UpdateEvent {
            entries: changed_entries,
            entries_map,
            names: names
                .iter()
                .map(|name| name.as_ref().to_string())
                .collect::<HashSet<_>>(),
        };
        self.listeners.dispatch(&event);
        true
    }

    /// Release properties still pending at `request_id` for `requests`
    ///
    /// Called after a failed fetch, or after a response that left some of
    /// the requested names out.
    pub fn abandon_requests(&mut self, request_id: RequestId, requests: &[MetadataRequest<E>]) {
        for request in requests {
            let key = request.entry.cache_key();
            if let Some(item) = self.storage.peek_mut(&key) {
                item.abandon_requests(request_id, &request.names);
            }
        }
    }

    /// Cached values of `names` for each entry, fresh or stale
    ///
    /// Entries without an item yield an empty record. Counts as a use of
    /// each item for eviction.
    pub fn get<S: AsRef<str>>(&mut self, entries: &[E], names: &[S]) -> Vec<Properties> {
        entries
            .iter()
            .map(|entry| {
                self.storage
                    .get(&entry.cache_key())
                    .map(|item| item.get(names))
                    .unwrap_or_default()
            })
            .collect()
    }

    /// Mark every property of `entries` stale as of `request_id`
    ///
    /// Entries without an item are skipped.
    pub fn invalidate(&mut self, request_id: RequestId, entries: &[E]) {
        let mut invalidated = 0usize;
        for entry in entries {
            if let Some(item) = self.storage.peek_mut(&entry.cache_key()) {
                item.invalidate(request_id);
                invalidated += 1;
            }
        }
        debug!(
            request_id = request_id,
            entries = entries.len(),
            invalidated = invalidated,
            "Invalidated metadata cache"
        );
    }

    /// Remove the items stored under `urls`
    pub fn clear<S: AsRef<str>>(&mut self, urls: &[S]) {
        for url in urls {
            self.storage.remove(url.as_ref());
        }
        debug!(urls = urls.len(), "Cleared metadata cache items");
    }

    /// Remove every item
    pub fn clear_all(&mut self) {
        self.storage.remove_all();
        debug!("Cleared all metadata cache items");
    }

    /// Independent copy of the items for `entries`
    ///
    /// The snapshot is backed by map storage, holds clones of the items and
    /// has no listeners. Entries without an item are not copied.
    pub fn create_snapshot(&self, entries: &[E]) -> MetadataCacheSet<E> {
        let mut storage = MapCacheStorage::new();
        for entry in entries {
            let key = entry.cache_key();
            if let Some(item) = self.storage.peek(&key) {
                storage.put(key.into_owned(), item.clone());
            }
        }
        debug!(
            entries = entries.len(),
            copied = storage.len(),
            "Created metadata cache snapshot"
        );
        MetadataCacheSet::new(Box::new(storage))
    }

    /// Whether `names` are fresh for every entry
    ///
    /// Vacuously true for no names; an entry without an item is not fresh.
    pub fn has_fresh_cache<S: AsRef<str>>(&self, entries: &[E], names: &[S]) -> bool {
        if names.is_empty() {
            return true;
        }
        entries.iter().all(|entry| {
            self.storage
                .peek(&entry.cache_key())
                .is_some_and(|item| item.has_fresh_cache(names))
        })
    }

    /// Whether any of `names` is in flight for any of `entries`
    pub fn has_pending_requests<S: AsRef<str>>(&self, entries: &[E], names: &[S]) -> bool {
        entries.iter().any(|entry| {
            self.storage
                .peek(&entry.cache_key())
                .is_some_and(|item| item.has_pending_requests(names))
        })
    }

    /// Item stored for `entry`, without touching recency
    pub fn peek_item(&self, entry: &E) -> Option<&MetadataCacheItem> {
        self.storage.peek(&entry.cache_key())
    }

    /// Register an update listener
    pub fn on_update<F>(&mut self, listener: F) -> ListenerId
    where
        F: Fn(&UpdateEvent<E>) + Send + Sync + 'static,
    {
        self.listeners.add(listener)
    }

    /// Unregister a listener; returns false if it was not registered
    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Number of entries with an item
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }
}
