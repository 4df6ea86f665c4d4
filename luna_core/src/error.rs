//! Error types for the luna_core library.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for luna_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Persisted event log is unreadable or corrupt
    #[error("Storage error: {0}")]
    Storage(String),

    /// Event rejected at the append boundary
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Rule catalog validation error
    #[error("Catalog validation error: {0}")]
    Catalog(String),
}

impl Error {
    /// True for errors that the caller may absorb by falling back to an empty log
    pub fn is_storage(&self) -> bool {
        matches!(self, Error::Storage(_))
    }
}
