//! # Keiba Features Crate
//!
//! Column-level helpers that turn query results into model inputs.
//!
//! - `normalize`, `bin`, `one_hot`: append a derived column to a `ResultTable`.
//! - `group_*` / `aggregate_by`: in-memory versions of the SQL rate aggregates.
//! - `race_key` / `entrant_key`: stable identifiers for races and entrants.
//! - `FeatureExtractor`: race and entrant tables in, one feature row per entrant out.
//! - `to_dataframe` / `write_parquet`: hand a table over to polars.

pub mod aggregate;
pub mod binning;
pub mod encode;
pub mod error;
pub mod extractor;
pub mod frame;
pub mod keys;
pub mod normalize;

pub use aggregate::{aggregate_by, group_counts, group_roi, group_top3_rate, group_win_rate};
pub use binning::{UNBINNED, bin};
pub use encode::one_hot;
pub use error::FeatureError;
pub use extractor::{
    BodyWeightFeatures, EntityKeyFeatures, Extractor, FeatureExtractor, OddsFeatures, extract_cached,
};
pub use frame::{to_dataframe, write_parquet};
pub use keys::{ENTRANT_ID, RACE_ID, entrant_key, race_key, with_entity_keys};
pub use normalize::{NormalizeMethod, normalize};
