//! Errors surfaced by the metadata model

use crate::config::ConfigError;
use crate::provider::ProviderError;

/// Metadata model error types
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Provider returned {actual} results for {expected} requests")]
    ResultCountMismatch { expected: usize, actual: usize },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}
