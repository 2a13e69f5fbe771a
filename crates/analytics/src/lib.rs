//! # Keiba Analytics
//!
//! The analytical query library: a catalog of fixed, parameterized statements
//! over the race (`jvd_ra`), entrant (`jvd_se`) and pedigree (`jvd_um`) tables,
//! run through the on-disk cache.
//!
//! ## Architectural Principles
//!
//! - **Pure catalog:** `catalog` functions only build statements and
//!   parameters. They can be inspected and tested without a database.
//! - **One derivation:** aggregate statements return raw counts; win rate,
//!   top-3 rate, ROI and its letter grade are computed once, in `metrics`.
//! - **Cached by content:** results are keyed on the analysis name, the final
//!   statement text and every bound value.
//!
//! ## Public API
//!
//! - `AnalyticsLibrary`: runs catalog queries through `cache::CacheStore`.
//! - `catalog`: the statements and the `Distribution` analyses.
//! - `metrics`: `AggregateCounts`, `AggregateRecord` and the rate formulas.
//! - `DatabaseReport`: per-table structure overview.
//! - `AnalyticsError`: the specific error types that can be returned from this crate.

pub mod catalog;
pub mod error;
pub mod library;
pub mod metrics;
pub mod report;

pub use catalog::{AnalysisQuery, Distribution};
pub use error::AnalyticsError;
pub use library::AnalyticsLibrary;
pub use metrics::{AggregateCounts, AggregateRecord, derive_rate_columns, round2};
pub use report::{DatabaseReport, TableReport, database_report};
