use cache::CacheError;
use core_types::ValidationError;
use database::DbError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error("Database error: {0}")]
    Db(#[from] DbError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationError),

    #[error("Result is missing required column '{0}'")]
    MissingColumn(String),

    #[error("Column '{column}' holds a non-numeric value at row {row}")]
    NonNumeric { column: String, row: usize },
}
