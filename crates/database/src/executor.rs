use crate::connection;
use crate::error::DbError;
use crate::template::QueryTemplate;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use configuration::DatabaseSettings;
use core_types::{Params, ResultTable, Value};
use rust_decimal::Decimal;
use sqlx::postgres::{PgArguments, PgPool, PgRow, Postgres};
use sqlx::query::Query;
use sqlx::{Column, Executor, Row, TypeInfo, ValueRef};
use std::time::Instant;
use tokio::runtime::Runtime;
use tracing::{debug, info};

/// Runs a parameterized statement and returns its rows.
///
/// Row order is exactly what the engine returned. There is no retry; a failed
/// query is reported to the caller as is.
pub trait QueryExecutor {
    fn execute(&self, query: &QueryTemplate, params: &Params) -> Result<ResultTable, DbError>;
}

impl<T: QueryExecutor + ?Sized> QueryExecutor for &T {
    fn execute(&self, query: &QueryTemplate, params: &Params) -> Result<ResultTable, DbError> {
        (**self).execute(query, params)
    }
}

/// Blocking PostgreSQL executor.
///
/// Owns a single-threaded tokio runtime and blocks the calling thread on
/// every query. Field order matters: the pool is closed and dropped before
/// the runtime that drives it.
pub struct PgExecutor {
    pool: PgPool,
    runtime: Runtime,
}

impl PgExecutor {
    pub fn connect(settings: &DatabaseSettings) -> Result<Self, DbError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let pool = runtime.block_on(connection::connect(settings))?;
        info!(
            host = %settings.host,
            port = settings.port,
            database = %settings.database,
            "Connected to the database"
        );
        Ok(Self { pool, runtime })
    }
}

impl QueryExecutor for PgExecutor {
    fn execute(&self, query: &QueryTemplate, params: &Params) -> Result<ResultTable, DbError> {
        let bound = query.bind(params)?;
        debug!(sql = %bound.sql, params = bound.values.len(), "Executing query");

        let started = Instant::now();
        let (columns, rows) = self.runtime.block_on(async {
            let mut q = sqlx::query(&bound.sql);
            for value in &bound.values {
                q = bind_value(q, value);
            }
            let rows = q.fetch_all(&self.pool).await?;
            // With no rows to read names from, ask the server for the statement's columns.
            let columns = match rows.first() {
                Some(first) => column_names(first.columns()),
                None => column_names((&self.pool).describe(&bound.sql).await?.columns()),
            };
            Ok::<_, sqlx::Error>((columns, rows))
        })?;

        let table = rows_to_table(columns, &rows)?;
        debug!(
            rows = table.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Query finished"
        );
        Ok(table)
    }
}

impl Drop for PgExecutor {
    fn drop(&mut self) {
        let pool = self.pool.clone();
        self.runtime.block_on(pool.close());
    }
}

fn bind_value<'q>(
    q: Query<'q, Postgres, PgArguments>,
    value: &Value,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        Value::Null => q.bind(None::<String>),
        Value::Text(s) => q.bind(s.clone()),
        Value::Int(i) => q.bind(*i),
        Value::Float(f) => q.bind(*f),
        Value::Decimal(d) => q.bind(*d),
    }
}

fn column_names<C: Column>(columns: &[C]) -> Vec<String> {
    columns.iter().map(|c| c.name().to_string()).collect()
}

/// Converts driver rows into a [`ResultTable`] with the given header, which
/// is kept even when there are no rows.
fn rows_to_table(columns: Vec<String>, rows: &[PgRow]) -> Result<ResultTable, DbError> {
    let mut table = ResultTable::new(columns);
    for row in rows {
        let values = (0..row.len())
            .map(|idx| decode_cell(row, idx))
            .collect::<Result<Vec<_>, _>>()?;
        table.push_row(values)?;
    }
    Ok(table)
}

fn decode_cell(row: &PgRow, idx: usize) -> Result<Value, DbError> {
    if row.try_get_raw(idx)?.is_null() {
        return Ok(Value::Null);
    }

    let column = &row.columns()[idx];
    let value = match column.type_info().name() {
        "TEXT" | "VARCHAR" | "CHAR" | "BPCHAR" | "NAME" => Value::Text(row.try_get::<String, _>(idx)?),
        "INT2" => Value::Int(i64::from(row.try_get::<i16, _>(idx)?)),
        "INT4" => Value::Int(i64::from(row.try_get::<i32, _>(idx)?)),
        "INT8" => Value::Int(row.try_get::<i64, _>(idx)?),
        "FLOAT4" => Value::Float(f64::from(row.try_get::<f32, _>(idx)?)),
        "FLOAT8" => Value::Float(row.try_get::<f64, _>(idx)?),
        "NUMERIC" => Value::Decimal(row.try_get::<Decimal, _>(idx)?),
        "BOOL" => Value::Int(i64::from(row.try_get::<bool, _>(idx)?)),
        "DATE" => Value::Text(row.try_get::<NaiveDate, _>(idx)?.to_string()),
        "TIMESTAMP" => Value::Text(row.try_get::<NaiveDateTime, _>(idx)?.to_string()),
        "TIMESTAMPTZ" => Value::Text(row.try_get::<DateTime<Utc>, _>(idx)?.to_rfc3339()),
        other => {
            return Err(DbError::UnsupportedColumnType {
                column: column.name().to_string(),
                type_name: other.to_string(),
            });
        }
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_result_keeps_its_header() {
        let table = rows_to_table(vec!["kishu_code".to_string(), "total_races".to_string()], &[]).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.columns(), ["kishu_code", "total_races"]);
    }
}
