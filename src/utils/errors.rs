use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the generation cache
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Producer failed: {0}")]
    Producer(#[source] anyhow::Error),

    #[error("Failed to persist cache to {path}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cache file {path} is corrupt: {source}")]
    CorruptStore {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl CacheError {
    /// Shorthand for rejecting a missing or empty field
    pub fn missing(field: &str) -> Self {
        CacheError::InvalidInput(format!("{} is required", field))
    }
}
