//! Cache entries
//!
//! Anything the cache tracks must expose a stable URL-like identity. An entry
//! may also carry a previously computed URL, which takes precedence so that
//! entries whose identity changes (renames) keep addressing their cached
//! item until they are re-resolved.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

/// An object whose properties can be cached
pub trait Entry: Clone {
    /// Compute the entry's URL
    fn to_url(&self) -> String;

    /// URL computed earlier, if the entry keeps one
    fn cached_url(&self) -> Option<&str> {
        None
    }

    /// Storage key: the cached URL when present, otherwise `to_url()`
    fn cache_key(&self) -> Cow<'_, str> {
        match self.cached_url() {
            Some(url) => Cow::Borrowed(url),
            None => Cow::Owned(self.to_url()),
        }
    }
}

/// Storage keys for a list of entries
pub fn entries_to_urls<E: Entry>(entries: &[E]) -> Vec<String> {
    entries
        .iter()
        .map(|entry| entry.cache_key().into_owned())
        .collect()
}

/// Convert a local path to a `file://` URL, percent-encoding each segment
pub fn path_to_url(path: &Path) -> String {
    let raw = path.to_string_lossy();
    let encoded = raw
        .split('/')
        .map(urlencoding::encode)
        .collect::<Vec<_>>()
        .join("/");

    if encoded.starts_with('/') {
        format!("file://{}", encoded)
    } else {
        format!("file:///{}", encoded)
    }
}

/// A file or directory on the local filesystem
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Current path of the file
    path: PathBuf,
    /// URL resolved when the entry was created or last refreshed
    cached_url: Option<String>,
}

impl FileEntry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cached_url: None,
        }
    }

    /// Resolve and keep the entry's URL
    pub fn with_cached_url(mut self) -> Self {
        self.refresh_url();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Move the entry to a new path
    ///
    /// A cached URL is left as is until `refresh_url` is called.
    pub fn rename(&mut self, new_path: impl Into<PathBuf>) {
        self.path = new_path.into();
    }

    /// Recompute the cached URL from the current path
    pub fn refresh_url(&mut self) {
        self.cached_url = Some(path_to_url(&self.path));
    }
}

impl Entry for FileEntry {
    fn to_url(&self) -> String {
        path_to_url(&self.path)
    }

    fn cached_url(&self) -> Option<&str> {
        self.cached_url.as_deref()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::Entry;

    /// Entry identified directly by its URL
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub(crate) struct UrlEntry(pub(crate) String);

    impl UrlEntry {
        pub(crate) fn new(url: &str) -> Self {
            Self(url.to_string())
        }
    }

    impl Entry for UrlEntry {
        fn to_url(&self) -> String {
            self.0.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_to_url() {
        assert_eq!(path_to_url(Path::new("/tmp/a.txt")), "file:///tmp/a.txt");
        assert_eq!(
            path_to_url(Path::new("/home/me/my file#1.txt")),
            "file:///home/me/my%20file%231.txt"
        );
        assert_eq!(path_to_url(Path::new("relative/b")), "file:///relative/b");
    }

    #[test]
    fn test_cache_key_prefers_cached_url() {
        let mut entry = FileEntry::new("/tmp/old.txt").with_cached_url();
        entry.rename("/tmp/new.txt");

        assert_eq!(entry.cache_key(), "file:///tmp/old.txt");
        assert_eq!(entry.to_url(), "file:///tmp/new.txt");

        entry.refresh_url();
        assert_eq!(entry.cache_key(), "file:///tmp/new.txt");
    }

    #[test]
    fn test_cache_key_without_cached_url() {
        let entry = FileEntry::new("/tmp/a.txt");
        assert_eq!(entry.cached_url(), None);
        assert_eq!(entry.cache_key(), "file:///tmp/a.txt");
    }

    #[test]
    fn test_entries_to_urls() {
        let entries = vec![FileEntry::new("/a"), FileEntry::new("/b").with_cached_url()];
        assert_eq!(entries_to_urls(&entries), vec!["file:///a", "file:///b"]);
    }
}
