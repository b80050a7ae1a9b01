//! metacache - per-entry metadata cache
//!
//! Keeps independently fetchable properties of many entries (files) cached,
//! deduplicates outstanding fetches, discards responses that a later request
//! or invalidation superseded, and hands out isolated snapshots for
//! rendering.

pub mod cache;
pub mod config;
pub mod entry;
pub mod error;
pub mod model;
pub mod provider;

pub use cache::{
    CacheStorage, ListenerId, LruCacheStorage, MapCacheStorage, MetadataCacheItem,
    MetadataCacheSet, MetadataRequest, Properties, PropertyState, RequestId, UpdateEvent,
};
pub use config::{CacheConfig, ConfigError};
pub use entry::{entries_to_urls, path_to_url, Entry, FileEntry};
pub use error::MetadataError;
pub use model::MetadataModel;
pub use provider::{FileSystemProvider, MetadataProvider, ProviderError};
