//! # Keiba Cache Crate
//!
//! Persists query results on disk so that expensive analytical queries run
//! once per distinct parameter set.
//!
//! - `CacheKey`: deterministic key derived from an analysis name, its
//!   statement text and its parameters.
//! - `CacheStore`: a directory of JSON-serialized `ResultTable`s with
//!   `get` / `put` / `get_or_compute`.
//! - `CacheError`: the specific error types that can be returned from this crate.

pub mod error;
pub mod key;
pub mod store;

pub use error::CacheError;
pub use key::CacheKey;
pub use store::{CACHE_EXTENSION, CacheEntryInfo, CacheStore};
