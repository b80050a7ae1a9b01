//! Metadata Cache Item
//!
//! Authoritative per-entry state. Each property name ever requested for the
//! entry moves through `Pending -> Fresh -> Stale -> Pending -> ...`, and the
//! epoch carried by each state decides whether a late response is applied.

use std::collections::HashMap;

use serde_json::Value;
use tracing::trace;

/// Caller-assigned, monotonically increasing epoch of a fetch or invalidation
pub type RequestId = u64;

/// Property name -> value record exchanged with providers and renderers
pub type Properties = HashMap<String, Value>;

/// State of one tracked property
///
/// A property that was never requested has no state at all (it is unknown).
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyState {
    /// In flight at `epoch`; keeps the previous value while waiting
    Pending {
        epoch: RequestId,
        value: Option<Value>,
    },
    /// Stored by a response at `epoch` and not invalidated since
    Fresh { epoch: RequestId, value: Value },
    /// Invalidated at `epoch`; the last value stays readable
    Stale {
        epoch: RequestId,
        value: Option<Value>,
    },
}

impl PropertyState {
    /// Epoch of the latest request, response or invalidation for this property
    pub fn epoch(&self) -> RequestId {
        match self {
            PropertyState::Pending { epoch, .. }
            | PropertyState::Fresh { epoch, .. }
            | PropertyState::Stale { epoch, .. } => *epoch,
        }
    }

    /// Last known value, fresh or not
    pub fn value(&self) -> Option<&Value> {
        match self {
            PropertyState::Fresh { value, .. } => Some(value),
            PropertyState::Pending { value, .. } | PropertyState::Stale { value, .. } => {
                value.as_ref()
            }
        }
    }

    pub fn is_fresh(&self) -> bool {
        matches!(self, PropertyState::Fresh { .. })
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, PropertyState::Pending { .. })
    }
}

/// Cached properties of a single entry
#[derive(Debug, Clone, Default)]
pub struct MetadataCacheItem {
    properties: HashMap<String, PropertyState>,
}

impl MetadataCacheItem {
    /// Create an item that tracks no properties yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Names among `names` that must be fetched
    ///
    /// Unknown and stale properties are returned. Fresh properties and
    /// properties already in flight are not, so concurrent callers never
    /// issue duplicate fetches. Duplicates in `names` are reported once.
    pub fn create_requests<S: AsRef<str>>(&self, names: &[S]) -> Vec<String> {
        let mut requested: Vec<String> = Vec::new();
        for name in names {
            let name = name.as_ref();
            let needs_fetch = match self.properties.get(name) {
                None | Some(PropertyState::Stale { .. }) => true,
                Some(PropertyState::Pending { .. }) | Some(PropertyState::Fresh { .. }) => false,
            };
            if needs_fetch && !requested.iter().any(|r| r == name) {
                requested.push(name.to_string());
            }
        }
        requested
    }

    /// Record that `names` are now in flight at `request_id`
    ///
    /// Fresh properties are left untouched. Epochs never move backwards.
    pub fn start_requests<S: AsRef<str>>(&mut self, request_id: RequestId, names: &[S]) {
        for name in names {
            let name = name.as_ref();
            let next = match self.properties.remove(name) {
                None => PropertyState::Pending {
                    epoch: request_id,
                    value: None,
                },
                Some(PropertyState::Stale { epoch, value })
                | Some(PropertyState::Pending { epoch, value }) => PropertyState::Pending {
                    epoch: epoch.max(request_id),
                    value,
                },
                Some(fresh @ PropertyState::Fresh { .. }) => fresh,
            };
            self.properties.insert(name.to_string(), next);
        }
    }

    /// Apply a provider response issued at `request_id`
    ///
    /// A value is accepted when its property is tracked and `request_id` is
    /// not behind the property's epoch. A response carrying exactly the epoch
    /// of the latest invalidation is accepted; equal epochs on a fresh value
    /// are last-write-wins. Returns true if any property was updated.
    pub fn store_properties(&mut self, request_id: RequestId, result: &Properties) -> bool {
        let mut changed = false;
        for (name, value) in result {
            let Some(state) = self.properties.get_mut(name) else {
                trace!(name = %name, "Ignoring value for a property never requested");
                continue;
            };
            if request_id < state.epoch() {
                trace!(
                    name = %name,
                    request_id = request_id,
                    epoch = state.epoch(),
                    "Ignoring superseded response"
                );
                continue;
            }
            *state = PropertyState::Fresh {
                epoch: request_id,
                value: value.clone(),
            };
            changed = true;
        }
        changed
    }

    /// Release properties still pending at exactly `request_id`
    ///
    /// Used when a fetch failed or its response omitted some names. Such
    /// properties become stale (keeping any previous value) or unknown again,
    /// so the next `create_requests` asks for them.
    pub fn abandon_requests<S: AsRef<str>>(&mut self, request_id: RequestId, names: &[S]) {
        for name in names {
            let name = name.as_ref();
            let previous = match self.properties.get(name) {
                Some(PropertyState::Pending { epoch, value }) if *epoch == request_id => {
                    value.clone()
                }
                _ => continue,
            };
            match previous {
                Some(value) => {
                    self.properties.insert(
                        name.to_string(),
                        PropertyState::Stale {
                            epoch: request_id,
                            value: Some(value),
                        },
                    );
                }
                None => {
                    self.properties.remove(name);
                }
            }
        }
    }

    /// Values stored for `names`, fresh or stale
    ///
    /// Names with no value are absent from the result.
    pub fn get<S: AsRef<str>>(&self, names: &[S]) -> Properties {
        names
            .iter()
            .filter_map(|name| {
                let name = name.as_ref();
                self.properties
                    .get(name)
                    .and_then(PropertyState::value)
                    .map(|value| (name.to_string(), value.clone()))
            })
            .collect()
    }

    /// Mark every tracked property stale as of `request_id`
    ///
    /// Values are kept. In-flight fetches issued before `request_id` will
    /// have their responses rejected.
    pub fn invalidate(&mut self, request_id: RequestId) {
        for state in self.properties.values_mut() {
            let epoch = state.epoch().max(request_id);
            let value = state.value().cloned();
            *state = PropertyState::Stale { epoch, value };
        }
    }

    /// Whether every name in `names` is fresh
    pub fn has_fresh_cache<S: AsRef<str>>(&self, names: &[S]) -> bool {
        names.iter().all(|name| {
            self.properties
                .get(name.as_ref())
                .is_some_and(PropertyState::is_fresh)
        })
    }

    /// Whether any name in `names` is in flight
    pub fn has_pending_requests<S: AsRef<str>>(&self, names: &[S]) -> bool {
        names.iter().any(|name| {
            self.properties
                .get(name.as_ref())
                .is_some_and(PropertyState::is_pending)
        })
    }

    /// Current state of one property, if tracked
    pub fn property_state(&self, name: &str) -> Option<&PropertyState> {
        self.properties.get(name)
    }

    /// Number of tracked properties
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}
