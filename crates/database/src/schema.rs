//! Schema introspection through `information_schema`.

use crate::error::DbError;
use crate::executor::QueryExecutor;
use crate::template::QueryTemplate;
use core_types::{Limit, Params, ResultTable, SqlFragment, TableName, Value};
use serde::Serialize;

/// Only tables in this schema are listed or inspected.
pub const DEFAULT_SCHEMA: &str = "public";

/// One column of a table as reported by `information_schema.columns`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
}

/// Names of all base tables, alphabetically.
pub fn list_tables(executor: &(impl QueryExecutor + ?Sized)) -> Result<Vec<String>, DbError> {
    let query = QueryTemplate::new(
        "SELECT table_name::text AS table_name \
         FROM information_schema.tables \
         WHERE table_schema = :schema AND table_type = 'BASE TABLE' \
         ORDER BY table_name",
    );
    let table = executor.execute(&query, &Params::new().with("schema", DEFAULT_SCHEMA))?;
    Ok(table
        .iter()
        .filter_map(|row| row.text("table_name").map(str::to_string))
        .collect())
}

/// Columns of `table` in ordinal order.
pub fn table_columns(
    executor: &(impl QueryExecutor + ?Sized),
    table: &TableName,
) -> Result<Vec<ColumnInfo>, DbError> {
    let query = QueryTemplate::new(
        "SELECT column_name::text AS column_name, data_type::text AS data_type, \
                is_nullable::text AS is_nullable \
         FROM information_schema.columns \
         WHERE table_schema = :schema AND table_name = :table \
         ORDER BY ordinal_position",
    );
    let params = Params::new()
        .with("schema", DEFAULT_SCHEMA)
        .with("table", table.as_str());
    let result = executor.execute(&query, &params)?;
    Ok(result
        .iter()
        .map(|row| ColumnInfo {
            name: row.text("column_name").unwrap_or_default().to_string(),
            data_type: row.text("data_type").unwrap_or_default().to_string(),
            nullable: row.text("is_nullable") == Some("YES"),
        })
        .collect())
}

pub fn row_count(
    executor: &(impl QueryExecutor + ?Sized),
    table: &TableName,
) -> Result<i64, DbError> {
    let query = QueryTemplate::builder()
        .push("SELECT COUNT(*) AS count FROM")
        .push_fragment(SqlFragment::table(table))
        .build();
    let result = executor.execute(&query, &Params::new())?;
    Ok(result
        .row(0)
        .and_then(|row| row.get("count"))
        .and_then(Value::as_i64)
        .unwrap_or(0))
}

/// The first `limit` rows of `table`, in whatever order the engine returns them.
pub fn sample_rows(
    executor: &(impl QueryExecutor + ?Sized),
    table: &TableName,
    limit: Limit,
) -> Result<ResultTable, DbError> {
    let query = QueryTemplate::builder()
        .push("SELECT * FROM")
        .push_fragment(SqlFragment::table(table))
        .limit(Some(limit))
        .build();
    executor.execute(&query, &Params::new())
}
