use crate::error::ConfigError;
use core_types::{Year, YearRange};
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;

/// The root configuration structure for the entire application.
///
/// Every section has defaults, so an empty `config.toml` (or none at all)
/// yields a working configuration against a local `pckeiba` database.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub cache: CacheSettings,
    pub logging: LoggingSettings,
    pub analysis: AnalysisSettings,
}

impl Settings {
    /// Checks the values serde cannot check on its own.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.pool_size == 0 {
            return Err(ConfigError::ValidationError(
                "database.pool_size must be at least 1".to_string(),
            ));
        }
        self.analysis.year_range()?;
        Ok(())
    }
}

/// Connection parameters for the PostgreSQL source database.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    /// Upper bound on open connections held by one executor.
    pub pool_size: u32,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5432,
            database: "pckeiba".to_string(),
            user: "postgres".to_string(),
            password: "postgres".to_string(),
            pool_size: 1,
        }
    }
}

impl fmt::Debug for DatabaseSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"***")
            .field("pool_size", &self.pool_size)
            .finish()
    }
}

/// Where cached query results live.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub dir: PathBuf,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data/cache"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// An `EnvFilter` directive; `RUST_LOG` takes precedence when set.
    pub level: String,
    /// When set, logs are also written to a daily rolling file in this directory.
    pub directory: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
        }
    }
}

/// Defaults for the analytical queries when the CLI does not override them.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    pub start_year: u16,
    pub end_year: u16,
    /// How many years back the jockey course statistics look.
    pub years_range: u16,
    pub jockey_min_races: u32,
    pub sire_min_horses: u32,
    pub sire_min_races: u32,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            start_year: 2020,
            end_year: 2024,
            years_range: 5,
            jockey_min_races: 3,
            sire_min_horses: 3,
            sire_min_races: 10,
        }
    }
}

impl AnalysisSettings {
    pub fn year_range(&self) -> Result<YearRange, ConfigError> {
        let range = YearRange::new(Year::new(self.start_year)?, Year::new(self.end_year)?)?;
        Ok(range)
    }
}
