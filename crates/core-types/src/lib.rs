pub mod enums;
pub mod error;
pub mod sql;
pub mod table;
pub mod value;

// Re-export the core types to provide a clean public API.
pub use enums::{
    CodeLabel, DistanceBand, FINISH_SENTINELS, RoiRank, Surface, TrackCondition, Venue, Weather,
    parse_finish_position,
};
pub use error::ValidationError;
pub use sql::{Limit, RaceDate, SqlFragment, TableName, Year, YearRange};
pub use table::{ResultTable, Row};
pub use value::{Params, Value};
