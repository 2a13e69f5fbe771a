use std::path::Path;

// Declare the modules that make up this crate.
pub mod error;
pub mod logging;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use error::ConfigError;
pub use settings::{AnalysisSettings, CacheSettings, DatabaseSettings, LoggingSettings, Settings};

/// Default configuration file, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// Loads the application configuration.
///
/// Sources, later ones overriding earlier ones: built-in defaults, the TOML
/// file at `path` (or `config.toml`, which may be absent), then environment
/// variables such as `KEIBA__DATABASE__HOST`. An explicitly given `path` must
/// exist.
pub fn load_config(path: Option<&Path>) -> Result<Settings, ConfigError> {
    let file = match path {
        Some(p) => config::File::from(p).required(true),
        None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
    };

    let builder = config::Config::builder()
        .add_source(file)
        .add_source(
            config::Environment::with_prefix("KEIBA")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let settings = builder.try_deserialize::<Settings>()?;
    settings.validate()?;
    Ok(settings)
}

/// Parses configuration from TOML text, without consulting files or the environment.
pub fn load_config_from_str(toml: &str) -> Result<Settings, ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::from_str(toml, config::FileFormat::Toml))
        .build()?
        .try_deserialize::<Settings>()?;
    settings.validate()?;
    Ok(settings)
}
