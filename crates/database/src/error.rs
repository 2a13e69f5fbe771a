use core_types::ValidationError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Invalid database connection settings: {0}")]
    ConnectionConfigError(String),

    /// Connectivity, syntax and constraint failures reported by the engine.
    #[error("Query failed: {0}")]
    Query(#[from] sqlx::Error),

    #[error("Failed to start the database runtime: {0}")]
    Runtime(#[from] std::io::Error),

    #[error("Query placeholder ':{0}' has no bound value")]
    MissingParameter(String),

    #[error("Parameter '{0}' is not referenced by the query")]
    UnusedParameter(String),

    #[error("Column '{column}' has unsupported type {type_name}")]
    UnsupportedColumnType { column: String, type_name: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),
}
