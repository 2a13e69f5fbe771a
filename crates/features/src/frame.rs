//! Bridge from [`ResultTable`] to polars for downstream modeling.

use crate::error::FeatureError;
use core_types::{ResultTable, Value};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;

/// Converts one column, picking the narrowest dtype that holds every non-null
/// cell: i64 when all are integers, f64 when all are numeric, otherwise text.
fn to_series(name: &str, cells: &[&Value]) -> Series {
    let present = || cells.iter().filter(|v| !v.is_null());
    let all_int = present().all(|v| matches!(v, Value::Int(_)));
    let all_numeric = present().all(|v| matches!(v, Value::Int(_) | Value::Float(_) | Value::Decimal(_)));
    let has_values = present().next().is_some();

    if has_values && all_int {
        let values: Vec<Option<i64>> = cells.iter().map(|v| v.as_i64()).collect();
        Series::new(name, values)
    } else if has_values && all_numeric {
        let values: Vec<Option<f64>> = cells.iter().map(|v| v.as_f64()).collect();
        Series::new(name, values)
    } else {
        let values: Vec<Option<String>> = cells
            .iter()
            .map(|v| (!v.is_null()).then(|| v.to_string()))
            .collect();
        Series::new(name, values)
    }
}

pub fn to_dataframe(table: &ResultTable) -> Result<DataFrame, FeatureError> {
    let mut columns = Vec::with_capacity(table.width());
    for name in table.columns() {
        let cells: Vec<&Value> = table
            .column_values(name)
            .ok_or_else(|| FeatureError::MissingColumn(name.clone()))?
            .collect();
        columns.push(to_series(name, &cells));
    }
    Ok(DataFrame::new(columns)?)
}

/// Writes `frame` to a parquet file at `path`, replacing any existing file.
pub fn write_parquet(frame: &mut DataFrame, path: &Path) -> Result<(), FeatureError> {
    let file = File::create(path).map_err(|source| FeatureError::Io {
        path: path.display().to_string(),
        source,
    })?;
    ParquetWriter::new(file).finish(frame)?;
    Ok(())
}
