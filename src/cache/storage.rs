//! Cache Storage
//!
//! Key -> item containers behind the cache set. `get` counts as a use of the
//! item for recency purposes, `peek` never does, so polling for outstanding
//! requests does not keep an entry alive.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use moka::notification::RemovalCause;
use moka::policy::EvictionPolicy;
use moka::sync::Cache;
use tracing::{debug, trace, warn};

use super::item::MetadataCacheItem;
use crate::config::{CacheConfig, ConfigError};

/// Pluggable container of cache items keyed by entry URL
pub trait CacheStorage: Send {
    /// Look up an item and record the access
    fn get(&mut self, key: &str) -> Option<&MetadataCacheItem>;

    /// Look up an item without touching recency
    fn peek(&self, key: &str) -> Option<&MetadataCacheItem>;

    /// Mutable lookup without touching recency
    fn peek_mut(&mut self, key: &str) -> Option<&mut MetadataCacheItem>;

    /// Insert or replace an item
    fn put(&mut self, key: String, item: MetadataCacheItem);

    fn remove(&mut self, key: &str) -> Option<MetadataCacheItem>;

    fn remove_all(&mut self);

    /// Number of stored items
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys of all stored items, in no particular order
    fn keys(&self) -> Vec<String>;
}

/// Bounded storage for the live cache
///
/// Items live in a map; a Moka cache holding only the keys tracks recency,
/// enforces the capacity with an LRU policy, and expires idle keys. Keys Moka
/// evicts are dropped from the map on the next `put`.
pub struct LruCacheStorage {
    /// Items by key
    items: HashMap<String, MetadataCacheItem>,
    /// Recency and capacity tracker
    recency: Cache<String, ()>,
    /// Keys evicted by Moka and not yet dropped from `items`
    evicted: Arc<Mutex<Vec<String>>>,
}

impl LruCacheStorage {
    /// Create a storage holding at most `capacity` items
    pub fn new(capacity: u64) -> Result<Self, ConfigError> {
        Self::with_config(&CacheConfig {
            capacity,
            ..CacheConfig::default()
        })
    }

    /// Create a storage from a cache config
    ///
    /// Fails if the config would produce a storage that keeps nothing.
    pub fn with_config(config: &CacheConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let evicted = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&evicted);

        let mut builder = Cache::builder()
            .name("metadata_cache_items")
            .max_capacity(config.capacity)
            .eviction_policy(EvictionPolicy::lru())
            .eviction_listener(move |key: Arc<String>, _: (), cause: RemovalCause| {
                // Explicit removals and replacements are handled by the caller
                if cause.was_evicted() {
                    sink.lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .push(key.as_ref().clone());
                }
            });
        if let Some(ttl) = config.time_to_idle {
            builder = builder.time_to_idle(ttl);
        }

        debug!(
            capacity = config.capacity,
            time_to_idle = ?config.time_to_idle,
            "Metadata cache storage initialized"
        );

        Ok(Self {
            items: HashMap::new(),
            recency: builder.build(),
            evicted,
        })
    }

    /// Run Moka maintenance and drop items it evicted
    fn drain_evicted(&mut self) {
        self.recency.run_pending_tasks();

        let keys = match self.evicted.lock() {
            Ok(mut keys) => std::mem::take(&mut *keys),
            Err(poisoned) => {
                warn!("Eviction queue lock poisoned, recovering");
                std::mem::take(&mut *poisoned.into_inner())
            }
        };

        for key in keys {
            // The key may have been put back after Moka dropped it
            if self.recency.contains_key(&key) {
                continue;
            }
            if self.items.remove(&key).is_some() {
                trace!(key = %key, "Evicted metadata cache item");
            }
        }
    }
}

impl CacheStorage for LruCacheStorage {
    fn get(&mut self, key: &str) -> Option<&MetadataCacheItem> {
        if self.recency.get(key).is_none() {
            // Expired or evicted; make sure the item goes with it
            self.items.remove(key);
            return None;
        }
        self.items.get(key)
    }

    fn peek(&self, key: &str) -> Option<&MetadataCacheItem> {
        self.items.get(key)
    }

    fn peek_mut(&mut self, key: &str) -> Option<&mut MetadataCacheItem> {
        self.items.get_mut(key)
    }

    fn put(&mut self, key: String, item: MetadataCacheItem) {
        self.items.insert(key.clone(), item);
        self.recency.insert(key, ());
        self.drain_evicted();
    }

    fn remove(&mut self, key: &str) -> Option<MetadataCacheItem> {
        self.recency.invalidate(key);
        self.items.remove(key)
    }

    fn remove_all(&mut self) {
        for key in self.items.keys() {
            self.recency.invalidate(key);
        }
        self.items.clear();
        self.recency.run_pending_tasks();
        self.evicted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    fn keys(&self) -> Vec<String> {
        self.items.keys().cloned().collect()
    }
}

/// Unbounded map storage, used for snapshots
///
/// Has no recency ordering, so `get` and `peek` are the same lookup.
#[derive(Debug, Clone, Default)]
pub struct MapCacheStorage {
    items: HashMap<String, MetadataCacheItem>,
}

impl MapCacheStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStorage for MapCacheStorage {
    fn get(&mut self, key: &str) -> Option<&MetadataCacheItem> {
        self.items.get(key)
    }

    fn peek(&self, key: &str) -> Option<&MetadataCacheItem> {
        self.items.get(key)
    }

    fn peek_mut(&mut self, key: &str) -> Option<&mut MetadataCacheItem> {
        self.items.get_mut(key)
    }

    fn put(&mut self, key: String, item: MetadataCacheItem) {
        self.items.insert(key, item);
    }

    fn remove(&mut self, key: &str) -> Option<MetadataCacheItem> {
        self.items.remove(key)
    }

    fn remove_all(&mut self) {
        self.items.clear();
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    fn keys(&self) -> Vec<String> {
        self.items.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn item_with_size(size: u64) -> MetadataCacheItem {
        let mut item = MetadataCacheItem::new();
        item.start_requests(1, &["size"]);
        item.store_properties(1, &[("size".to_string(), json!(size))].into());
        item
    }

    #[test]
    fn test_put_and_get() {
        let mut storage = LruCacheStorage::new(10).unwrap();
        storage.put("file:///a".to_string(), item_with_size(1));

        assert!(storage.get("file:///a").is_some());
        assert!(storage.peek("file:///a").is_some());
        assert!(storage.get("file:///missing").is_none());
        assert_eq!(storage.len(), 1);
    }

    #[test]
    fn test_capacity_is_enforced() {
        let mut storage = LruCacheStorage::new(2).unwrap();
        storage.put("a".to_string(), item_with_size(1));
        storage.put("b".to_string(), item_with_size(2));
        storage.put("c".to_string(), item_with_size(3));

        assert_eq!(storage.len(), 2);
        assert!(storage.peek("c").is_some());
    }

    #[test]
    fn test_get_protects_from_eviction() {
        let mut storage = LruCacheStorage::new(2).unwrap();
        storage.put("a".to_string(), item_with_size(1));
        storage.put("b".to_string(), item_with_size(2));

        // Only `a` is used; `b` becomes the eviction candidate
        assert!(storage.get("a").is_some());
        storage.put("c".to_string(), item_with_size(3));

        assert!(storage.peek("a").is_some());
        assert!(storage.peek("b").is_none());
        assert!(storage.peek("c").is_some());
    }

    #[test]
    fn test_remove_and_remove_all() {
        let mut storage = LruCacheStorage::new(10).unwrap();
        storage.put("a".to_string(), item_with_size(1));
        storage.put("b".to_string(), item_with_size(2));

        assert!(storage.remove("a").is_some());
        assert!(storage.remove("a").is_none());
        assert_eq!(storage.keys(), vec!["b".to_string()]);

        storage.remove_all();
        assert!(storage.is_empty());

        // Re-insertion after a full clear works normally
        storage.put("a".to_string(), item_with_size(4));
        assert!(storage.get("a").is_some());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(matches!(LruCacheStorage::new(0), Err(ConfigError::ZeroCapacity)));
    }

    #[test]
    fn test_idle_items_expire() {
        let config = CacheConfig {
            capacity: 10,
            time_to_idle: Some(Duration::from_millis(50)),
        };
        let mut storage = LruCacheStorage::with_config(&config).unwrap();
        storage.put("a".to_string(), item_with_size(1));
        assert!(storage.get("a").is_some());

        std::thread::sleep(Duration::from_millis(150));

        assert!(storage.get("a").is_none());
        assert!(storage.peek("a").is_none());
        assert!(storage.is_empty());
    }

    #[test]
    fn test_map_storage() {
        let mut storage = MapCacheStorage::new();
        storage.put("a".to_string(), item_with_size(1));

        assert!(storage.get("a").is_some());
        assert!(storage.peek_mut("a").is_some());
        assert_eq!(storage.len(), 1);

        storage.remove_all();
        assert!(storage.peek("a").is_none());
    }
}
