use crate::error::DbError;
use configuration::DatabaseSettings;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use std::time::Duration;

/// Translates our settings into driver connect options.
pub fn connect_options(settings: &DatabaseSettings) -> PgConnectOptions {
    PgConnectOptions::new()
        .host(&settings.host)
        .port(settings.port)
        .database(&settings.database)
        .username(&settings.user)
        .password(&settings.password)
}

/// Establishes a connection pool to the PostgreSQL database.
///
/// The pool is capped at `pool_size` connections. Must be awaited inside the
/// runtime that will later drive the pool.
pub async fn connect(settings: &DatabaseSettings) -> Result<PgPool, DbError> {
    if settings.pool_size == 0 {
        return Err(DbError::ConnectionConfigError(
            "pool_size must be at least 1".to_string(),
        ));
    }

    let pool = PgPoolOptions::new()
        .max_connections(settings.pool_size)
        .acquire_timeout(Duration::from_secs(5))
        .connect_with(connect_options(settings))
        .await?;

    Ok(pool)
}
