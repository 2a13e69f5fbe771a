use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration from file: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation error: {0}")]
    ValidationError(String),

    #[error("Failed to initialise logging: {0}")]
    LoggingError(String),
}

impl From<core_types::ValidationError> for ConfigError {
    fn from(e: core_types::ValidationError) -> Self {
        ConfigError::ValidationError(e.to_string())
    }
}
