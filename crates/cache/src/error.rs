use core_types::ValidationError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Failed to access cache file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The entry exists but cannot be turned back into a table.
    #[error("Cache entry '{key}' is corrupt: {reason}")]
    Deserialization { key: String, reason: String },

    #[error("Failed to serialize cache entry '{key}': {source}")]
    Serialization {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// JSON has no NaN or infinity, so such a cell would read back as null.
    #[error("Cache entry '{key}' cannot store non-finite value in column '{column}' at row {row}")]
    NonFiniteFloat { key: String, column: String, row: usize },

    #[error(transparent)]
    Validation(#[from] ValidationError),
}
