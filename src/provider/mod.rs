//! Metadata providers
//!
//! A provider performs the actual lookups for the requests a cache set
//! produces. The cache never calls one directly; `MetadataModel` does.

pub mod errors;
pub mod local;

use std::future::Future;

pub use errors::ProviderError;
pub use local::FileSystemProvider;

use crate::cache::{MetadataRequest, Properties};
use crate::entry::Entry;

/// Source of property values for entries
pub trait MetadataProvider: Send + Sync {
    /// Entry type this provider understands
    type Entry: Entry + Send + Sync;

    /// Fetch the requested properties
    ///
    /// Returns one record per request, in request order. A record may leave
    /// out names the provider could not produce; per-entry failures are
    /// expected to be reported as values (for example `null`), not as `Err`.
    fn fetch(
        &self,
        requests: &[MetadataRequest<Self::Entry>],
    ) -> impl Future<Output = Result<Vec<Properties>, ProviderError>> + Send;
}
