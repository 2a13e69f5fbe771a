//! # Keiba Database Crate
//!
//! This crate is the only place that talks to PostgreSQL. It hides the driver
//! behind a small, blocking [`QueryExecutor`] interface that returns generic
//! [`core_types::ResultTable`]s.
//!
//! ## Architectural Principles
//!
//! - **Bound values only:** every runtime value reaches the engine as a bound
//!   parameter. Statement text is assembled by [`QueryBuilder`] from static
//!   literals and validated fragments.
//! - **Blocking facade:** `sqlx` is async; [`PgExecutor`] owns a current-thread
//!   runtime and blocks on each call, which suits batch analytics.
//! - **No retry:** engine errors surface as [`DbError::Query`].
//!
//! ## Public API
//!
//! - `PgExecutor`: connects from `DatabaseSettings` and runs queries.
//! - `QueryTemplate` / `QueryBuilder`: statements with `:name` placeholders.
//! - `schema`: table listing and column introspection.
//! - `DbError`: the specific error types that can be returned from this crate.

// Declare the modules that constitute this crate.
pub mod connection;
pub mod error;
pub mod executor;
pub mod schema;
pub mod template;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export the key components to create a clean, public-facing API.
pub use connection::{connect, connect_options};
pub use error::DbError;
pub use executor::{PgExecutor, QueryExecutor};
pub use schema::{ColumnInfo, list_tables, row_count, sample_rows, table_columns};
pub use template::{BoundQuery, QueryBuilder, QueryTemplate};
