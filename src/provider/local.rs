//! Local filesystem provider
//!
//! Answers `size`, `modificationTime`, `isDirectory` and `readOnly` from
//! file metadata. Files that cannot be stat'ed get `null` for each requested
//! property so the cache records the failure instead of re-requesting it.

use std::fs::Metadata;
use std::time::UNIX_EPOCH;

use serde_json::Value;
use tracing::{trace, warn};

use super::{MetadataProvider, ProviderError};
use crate::cache::{MetadataRequest, Properties};
use crate::entry::FileEntry;

/// Size in bytes
pub const SIZE: &str = "size";
/// Last modification, milliseconds since the Unix epoch
pub const MODIFICATION_TIME: &str = "modificationTime";
pub const IS_DIRECTORY: &str = "isDirectory";
pub const READ_ONLY: &str = "readOnly";

/// Every property this provider can produce
pub const SUPPORTED_PROPERTIES: [&str; 4] = [SIZE, MODIFICATION_TIME, IS_DIRECTORY, READ_ONLY];

/// Provider backed by `tokio::fs::metadata`
#[derive(Debug, Clone, Default)]
pub struct FileSystemProvider;

impl FileSystemProvider {
    pub fn new() -> Self {
        Self
    }

    async fn fetch_one(&self, request: &MetadataRequest<FileEntry>) -> Properties {
        let path = request.entry.path();
        let supported = request
            .names
            .iter()
            .filter(|name| SUPPORTED_PROPERTIES.contains(&name.as_str()));

        match tokio::fs::metadata(path).await {
            Ok(metadata) => supported
                .map(|name| (name.clone(), property_value(&metadata, name)))
                .collect(),
            Err(e) => {
                let err = ProviderError::from_io(path, e);
                warn!(path = %path.display(), error = %err, "Failed to read file metadata");
                supported.map(|name| (name.clone(), Value::Null)).collect()
            }
        }
    }
}

/// Value of a supported property
fn property_value(metadata: &Metadata, name: &str) -> Value {
    match name {
        SIZE => Value::from(metadata.len()),
        MODIFICATION_TIME => metadata
            .modified()
            .ok()
            .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
            .map(|since| Value::from(since.as_millis() as u64))
            .unwrap_or(Value::Null),
        IS_DIRECTORY => Value::Bool(metadata.is_dir()),
        READ_ONLY => Value::Bool(metadata.permissions().readonly()),
        _ => Value::Null,
    }
}

impl MetadataProvider for FileSystemProvider {
    type Entry = FileEntry;

    async fn fetch(
        &self,
        requests: &[MetadataRequest<FileEntry>],
    ) -> Result<Vec<Properties>, ProviderError> {
        let mut results = Vec::with_capacity(requests.len());
        for request in requests {
            results.push(self.fetch_one(request).await);
        }
        trace!(requests = requests.len(), "Fetched local file metadata");
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(entry: FileEntry, names: &[&str]) -> MetadataRequest<FileEntry> {
        MetadataRequest {
            entry,
            names: names.iter().map(|n| n.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_fetch_file_properties() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, b"hello").unwrap();

        let provider = FileSystemProvider::new();
        let results = provider
            .fetch(&[request(
                FileEntry::new(&path),
                &[SIZE, IS_DIRECTORY, MODIFICATION_TIME, "thumbnail"],
            )])
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        let props = &results[0];
        assert_eq!(props.get(SIZE), Some(&json!(5)));
        assert_eq!(props.get(IS_DIRECTORY), Some(&json!(false)));
        assert!(props.get(MODIFICATION_TIME).is_some_and(Value::is_u64));
        assert!(!props.contains_key("thumbnail"));
    }

    #[tokio::test]
    async fn test_fetch_directory() {
        let dir = tempfile::tempdir().unwrap();

        let results = FileSystemProvider::new()
            .fetch(&[request(FileEntry::new(dir.path()), &[IS_DIRECTORY])])
            .await
            .unwrap();

        assert_eq!(results[0].get(IS_DIRECTORY), Some(&json!(true)));
    }

    #[tokio::test]
    async fn test_missing_file_yields_null_values() {
        let dir = tempfile::tempdir().unwrap();
        let missing = FileEntry::new(dir.path().join("gone.txt"));

        let results = FileSystemProvider::new()
            .fetch(&[request(missing, &[SIZE, READ_ONLY])])
            .await
            .unwrap();

        assert_eq!(results[0].get(SIZE), Some(&Value::Null));
        assert_eq!(results[0].get(READ_ONLY), Some(&Value::Null));
    }
}
