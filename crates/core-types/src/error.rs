use thiserror::Error;

/// A caller-supplied value was rejected before it could reach a query or the cache.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid limit '{0}': expected a positive integer")]
    InvalidLimit(String),

    #[error("Invalid SQL identifier '{0}'")]
    InvalidIdentifier(String),

    #[error("Unknown table '{0}'")]
    UnknownTable(String),

    #[error("Invalid analysis name '{0}': only lowercase letters, digits and '_' are allowed")]
    InvalidAnalysisName(String),

    #[error("Invalid year '{0}': expected four digits")]
    InvalidYear(String),

    #[error("Invalid year range: start year {start} is after end year {end}")]
    InvalidYearRange { start: u16, end: u16 },

    #[error("Invalid race date '{0}': expected YYYYMMDD")]
    InvalidRaceDate(String),

    #[error("Row has {actual} values but the table has {expected} columns")]
    RowWidth { expected: usize, actual: usize },

    #[error("Column '{column}' has {actual} values but the table has {expected} rows")]
    ColumnLength {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid input for {0}: {1}")]
    InvalidInput(String, String),
}
