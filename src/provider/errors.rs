//! Provider Error Types
//!
//! Failures of a metadata fetch. Maps I/O error kinds to specific variants so
//! callers can decide whether a retry makes sense.

use std::io;
use std::path::Path;

/// Metadata provider error types
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Request timeout")]
    Timeout,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Provider failure: {0}")]
    Failed(String),
}

impl ProviderError {
    /// Whether a later fetch of the same entry may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Timeout => true,
            ProviderError::Io(err) => matches!(
                err.kind(),
                io::ErrorKind::Interrupted | io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
            ),
            ProviderError::NotFound(_)
            | ProviderError::PermissionDenied(_)
            | ProviderError::Failed(_) => false,
        }
    }

    /// Create a ProviderError from an I/O error on `path`
    pub fn from_io(path: &Path, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => ProviderError::NotFound(path.display().to_string()),
            io::ErrorKind::PermissionDenied => {
                ProviderError::PermissionDenied(path.display().to_string())
            }
            io::ErrorKind::TimedOut => ProviderError::Timeout,
            _ => ProviderError::Io(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_io_maps_kinds() {
        let path = Path::new("/tmp/missing");

        let err = ProviderError::from_io(path, io::Error::from(io::ErrorKind::NotFound));
        assert!(matches!(err, ProviderError::NotFound(ref p) if p == "/tmp/missing"));
        assert!(!err.is_retryable());

        let err = ProviderError::from_io(path, io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(matches!(err, ProviderError::PermissionDenied(_)));

        let err = ProviderError::from_io(path, io::Error::from(io::ErrorKind::TimedOut));
        assert!(matches!(err, ProviderError::Timeout));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_io_retryability() {
        let interrupted = io::Error::from(io::ErrorKind::Interrupted);
        let err = ProviderError::from_io(Path::new("/x"), interrupted);
        assert!(err.is_retryable());

        let err = ProviderError::from_io(Path::new("/x"), io::Error::other("disk on fire"));
        assert!(!err.is_retryable());
        assert_eq!(err.to_string(), "I/O error: disk on fire");
    }
}
