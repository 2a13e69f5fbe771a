use crate::error::AnalyticsError;
use core_types::{Limit, Params, ResultTable, TableName};
use database::{ColumnInfo, QueryExecutor, QueryTemplate, list_tables, row_count, sample_rows, table_columns};
use serde::Serialize;
use tracing::info;

/// Structure of one table: its columns, size and a few sample rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableReport {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
    pub row_count: i64,
    /// Empty when the table has no rows.
    pub sample: ResultTable,
}

/// An overview of the database, used to orient before running analyses.
///
/// Besides the per-table structure, the race and entrant tables get two extra
/// summaries when present: the span of years covered, and how finishing
/// positions (including the scratched/disqualified sentinels) are distributed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatabaseReport {
    pub tables: Vec<TableReport>,
    pub race_year_range: Option<ResultTable>,
    pub finish_position_distribution: Option<ResultTable>,
}

/// Builds the report. Every table in the schema is visited in name order.
pub fn database_report(
    executor: &(impl QueryExecutor + ?Sized),
    sample_limit: Limit,
) -> Result<DatabaseReport, AnalyticsError> {
    let names = list_tables(executor)?;
    info!(tables = names.len(), "Inspecting database structure");

    let mut tables = Vec::with_capacity(names.len());
    for name in &names {
        let table = TableName::validate(name, &names)?;
        let columns = table_columns(executor, &table)?;
        let rows = row_count(executor, &table)?;
        let sample = if rows > 0 {
            sample_rows(executor, &table, sample_limit)?
        } else {
            ResultTable::default()
        };
        tables.push(TableReport {
            name: name.clone(),
            columns,
            row_count: rows,
            sample,
        });
    }

    let has = |table: &str| names.iter().any(|n| n == table);

    let race_year_range = if has("jvd_ra") {
        let query = QueryTemplate::new(
            "SELECT MIN(kaisai_nen) AS min_year, MAX(kaisai_nen) AS max_year, \
             COUNT(DISTINCT kaisai_nen) AS year_count FROM jvd_ra",
        );
        Some(executor.execute(&query, &Params::new())?)
    } else {
        None
    };

    let finish_position_distribution = if has("jvd_se") {
        let query = QueryTemplate::new(
            "SELECT kakutei_chakujun, COUNT(*) AS count, \
             ROUND(COUNT(*) * 100.0 / (SELECT COUNT(*) FROM jvd_se), 2) AS percentage \
             FROM jvd_se GROUP BY kakutei_chakujun ORDER BY kakutei_chakujun LIMIT 20",
        );
        Some(executor.execute(&query, &Params::new())?)
    } else {
        None
    };

    Ok(DatabaseReport {
        tables,
        race_year_range,
        finish_position_distribution,
    })
}
