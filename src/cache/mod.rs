//! Metadata caching layer
//!
//! Per-entry property cache that deduplicates outstanding fetches, tracks
//! freshness by request epoch, and hands out isolated snapshots.

pub mod events;
pub mod item;
pub mod set;
pub mod storage;

pub use events::{ListenerId, UpdateEvent};
pub use item::{MetadataCacheItem, Properties, PropertyState, RequestId};
pub use set::{MetadataCacheSet, MetadataRequest};
pub use storage::{CacheStorage, LruCacheStorage, MapCacheStorage};
