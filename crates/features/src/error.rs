use analytics::AnalyticsError;
use cache::CacheError;
use core_types::ValidationError;
use polars::prelude::PolarsError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FeatureError {
    /// The denominator of the normalization is zero, or there are too few values.
    #[error("Cannot normalize column '{column}' with {method}: degenerate range")]
    DegenerateRange { column: String, method: &'static str },

    #[error("Column '{0}' not found")]
    MissingColumn(String),

    #[error("Column '{column}' holds a non-numeric value at row {row}")]
    NonNumeric { column: String, row: usize },

    #[error("Invalid bins: {0}")]
    InvalidBins(String),

    #[error("Malformed key field '{field}': {value:?}")]
    MalformedKey { field: String, value: String },

    #[error("Unknown {kind} '{name}'")]
    Unknown { kind: &'static str, name: String },

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Analytics error: {0}")]
    Analytics(#[from] AnalyticsError),

    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationError),

    #[error("DataFrame error: {0}")]
    Frame(#[from] PolarsError),

    #[error("Failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
