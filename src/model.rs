//! Metadata Model
//!
//! Front door for renderers: issues request ids, asks the cache set what is
//! missing, fetches it through the provider and feeds the results back.
//! Concurrent callers asking for the same properties share one fetch.

use std::pin::pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;
use tracing::{debug, warn};

use crate::cache::{
    ListenerId, MetadataCacheSet, MetadataRequest, Properties, RequestId, UpdateEvent,
};
use crate::config::CacheConfig;
use crate::error::MetadataError;
use crate::provider::{MetadataProvider, ProviderError};

/// Cached metadata access backed by a provider
///
/// The cache lock is never held across a provider call, so it is a plain
/// mutex and the cache-only methods are synchronous.
pub struct MetadataModel<P: MetadataProvider> {
    /// Property cache
    cache: Mutex<MetadataCacheSet<P::Entry>>,
    /// Source of property values
    provider: P,
    /// Last issued request id
    last_request_id: AtomicU64,
    /// Woken whenever pending properties may have settled
    settled: Notify,
}

/// Requests started at one request id and not yet released
///
/// Dropping it releases whatever the fetch left pending and wakes waiters,
/// whether the fetch completed or the calling future was dropped mid-fetch.
struct InFlight<'a, P: MetadataProvider> {
    model: &'a MetadataModel<P>,
    request_id: RequestId,
    requests: &'a [MetadataRequest<P::Entry>],
    answered: bool,
}

impl<P: MetadataProvider> Drop for InFlight<'_, P> {
    fn drop(&mut self) {
        if !self.answered {
            debug!(
                request_id = self.request_id,
                requests = self.requests.len(),
                "Metadata fetch dropped before completion"
            );
        }
        self.model.lock_cache().abandon_requests(self.request_id, self.requests);
        self.model.settled.notify_waiters();
    }
}

impl<P: MetadataProvider> MetadataModel<P> {
    /// Create a model around an existing cache set
    pub fn new(provider: P, cache: MetadataCacheSet<P::Entry>) -> Self {
        Self {
            cache: Mutex::new(cache),
            provider,
            last_request_id: AtomicU64::new(0),
            settled: Notify::new(),
        }
    }

    /// Create a model with a bounded LRU cache
    pub fn with_config(provider: P, config: &CacheConfig) -> Result<Self, MetadataError> {
        Ok(Self::new(provider, MetadataCacheSet::with_config(config)?))
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    fn next_request_id(&self) -> RequestId {
        self.last_request_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Lock the cache, recovering it if a listener panicked under the lock
    fn lock_cache(&self) -> MutexGuard<'_, MetadataCacheSet<P::Entry>> {
        self.cache.lock().unwrap_or_else(|poisoned| {
            warn!("Metadata cache lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Get `names` for `entries`, fetching whatever is not cached
    ///
    /// Properties already being fetched by another caller are waited for
    /// rather than fetched again. If that fetch is dropped or leaves them
    /// unanswered, they are fetched here instead. Each call fetches at most
    /// once. The returned records may contain stale values when a concurrent
    /// invalidation raced the fetch.
    ///
    /// # Cancel safety
    /// Dropping the future mid-fetch releases its pending properties, so
    /// other callers waiting on them go on to fetch them themselves.
    pub async fn get<S: AsRef<str>>(
        &self,
        entries: &[P::Entry],
        names: &[S],
    ) -> Result<Vec<Properties>, MetadataError> {
        let names: Vec<String> = names.iter().map(|n| n.as_ref().to_string()).collect();
        let mut fetched = false;

        loop {
            let mut settled = pin!(self.settled.notified());
            settled.as_mut().enable();

            let started = {
                let mut cache = self.lock_cache();
                let requests = if fetched {
                    Vec::new()
                } else {
                    cache.create_requests(entries, &names)
                };
                if requests.is_empty() {
                    if !cache.has_pending_requests(entries, &names) {
                        return Ok(cache.get(entries, &names));
                    }
                    None
                } else {
                    let request_id = self.next_request_id();
                    cache.start_requests(request_id, &requests);
                    Some((request_id, requests))
                }
            };

            match started {
                Some((request_id, requests)) => {
                    fetched = true;
                    self.fetch(request_id, &requests, &names).await?;
                }
                // Someone else is fetching part of it
                None => settled.await,
            }
        }
    }

    /// Fetch started requests and store the results
    async fn fetch(
        &self,
        request_id: RequestId,
        requests: &[MetadataRequest<P::Entry>],
        names: &[String],
    ) -> Result<(), MetadataError> {
        let mut in_flight = InFlight {
            model: self,
            request_id,
            requests,
            answered: false,
        };
        debug!(
            request_id = request_id,
            requests = requests.len(),
            "Fetching metadata"
        );

        let fetched = self.provider.fetch(requests).await;
        in_flight.answered = true;
        self.store_fetched(request_id, requests, names, fetched)
    }

    /// Store a fetch outcome
    fn store_fetched(
        &self,
        request_id: RequestId,
        requests: &[MetadataRequest<P::Entry>],
        names: &[String],
        fetched: Result<Vec<Properties>, ProviderError>,
    ) -> Result<(), MetadataError> {
        match fetched {
            Ok(results) if results.len() == requests.len() => {
                let entries: Vec<P::Entry> = requests.iter().map(|r| r.entry.clone()).collect();
                self.lock_cache().store_properties(request_id, &entries, &results, names);
                Ok(())
            }
            Ok(results) => Err(MetadataError::ResultCountMismatch {
                expected: requests.len(),
                actual: results.len(),
            }),
            Err(err) => {
                warn!(
                    request_id = request_id,
                    error = %err,
                    retryable = err.is_retryable(),
                    "Metadata fetch failed"
                );
                Err(err.into())
            }
        }
    }

    /// Cached values only; never fetches
    pub fn get_cache<S: AsRef<str>>(&self, entries: &[P::Entry], names: &[S]) -> Vec<Properties> {
        self.lock_cache().get(entries, names)
    }

    /// Whether `names` are fresh for every entry
    pub fn has_fresh_cache<S: AsRef<str>>(&self, entries: &[P::Entry], names: &[S]) -> bool {
        self.lock_cache().has_fresh_cache(entries, names)
    }

    /// Whether any of `names` is being fetched for any entry
    pub fn has_pending_requests<S: AsRef<str>>(&self, entries: &[P::Entry], names: &[S]) -> bool {
        self.lock_cache().has_pending_requests(entries, names)
    }

    /// Mark everything cached for `entries` stale
    ///
    /// Outstanding fetches for these entries will have their results
    /// discarded; the next `get` fetches again.
    pub fn notify_entries_changed(&self, entries: &[P::Entry]) {
        let request_id = self.next_request_id();
        self.lock_cache().invalidate(request_id, entries);
        self.settled.notify_waiters();
    }

    /// Drop the cached items stored under `urls`
    pub fn clear<S: AsRef<str>>(&self, urls: &[S]) {
        self.lock_cache().clear(urls);
        self.settled.notify_waiters();
    }

    /// Drop every cached item
    pub fn clear_all(&self) {
        self.lock_cache().clear_all();
        self.settled.notify_waiters();
    }

    /// Isolated copy of the cache for `entries`
    pub fn create_snapshot(&self, entries: &[P::Entry]) -> MetadataCacheSet<P::Entry> {
        self.lock_cache().create_snapshot(entries)
    }

    /// Register an update listener
    ///
    /// Listeners run while the cache is locked and must not call back into
    /// the model.
    pub fn on_update<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&UpdateEvent<P::Entry>) + Send + Sync + 'static,
    {
        self.lock_cache().on_update(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.lock_cache().remove_listener(id)
    }
}
