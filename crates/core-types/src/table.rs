use crate::error::ValidationError;
use crate::value::Value;
use serde::{Deserialize, Serialize};

/// An ordered, column-named set of rows as returned by a query.
///
/// This is the data transfer object between the executor, the cache and the
/// feature utilities. Row order is whatever the producer decided; nothing in
/// this type ever re-sorts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultTable {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

/// A borrowed view of one row that can be indexed by column name.
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    columns: &'a [String],
    values: &'a [Value],
}

impl<'a> Row<'a> {
    pub fn get(&self, column: &str) -> Option<&'a Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| &self.values[i])
    }

    /// Convenience for string-typed source columns.
    pub fn text(&self, column: &str) -> Option<&'a str> {
        self.get(column).and_then(Value::as_str)
    }

    pub fn values(&self) -> &'a [Value] {
        self.values
    }

    pub fn columns(&self) -> &'a [String] {
        self.columns
    }
}

impl ResultTable {
    /// Creates an empty table with the given column names.
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Builds a table and checks every row against the column count.
    pub fn from_rows<S: Into<String>>(
        columns: impl IntoIterator<Item = S>,
        rows: Vec<Vec<Value>>,
    ) -> Result<Self, ValidationError> {
        let table = Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows,
        };
        table.validate()?;
        Ok(table)
    }

    /// Checks the shape invariant. Tables loaded from disk go through this.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let expected = self.columns.len();
        match self.rows.iter().find(|r| r.len() != expected) {
            Some(row) => Err(ValidationError::RowWidth {
                expected,
                actual: row.len(),
            }),
            None => Ok(()),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn push_row(&mut self, row: Vec<Value>) -> Result<(), ValidationError> {
        if row.len() != self.columns.len() {
            return Err(ValidationError::RowWidth {
                expected: self.columns.len(),
                actual: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn row(&self, index: usize) -> Option<Row<'_>> {
        self.rows.get(index).map(|values| Row {
            columns: &self.columns,
            values,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = Row<'_>> {
        self.rows.iter().map(|values| Row {
            columns: &self.columns,
            values,
        })
    }

    /// All cells of one column, top to bottom.
    pub fn column_values(&self, name: &str) -> Option<impl Iterator<Item = &Value>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(move |r| &r[idx]))
    }

    /// Appends a column, or replaces it in place if a column with that name exists.
    pub fn set_column(&mut self, name: &str, values: Vec<Value>) -> Result<(), ValidationError> {
        if values.len() != self.rows.len() {
            return Err(ValidationError::ColumnLength {
                column: name.to_string(),
                expected: self.rows.len(),
                actual: values.len(),
            });
        }
        match self.column_index(name) {
            Some(idx) => {
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row[idx] = value;
                }
            }
            None => {
                self.columns.push(name.to_string());
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row.push(value);
                }
            }
        }
        Ok(())
    }

    /// Removes a column. Returns `false` if it did not exist.
    pub fn drop_column(&mut self, name: &str) -> bool {
        let Some(idx) = self.column_index(name) else {
            return false;
        };
        self.columns.remove(idx);
        for row in &mut self.rows {
            row.remove(idx);
        }
        true
    }

    /// Returns a new table holding only the rows matching `predicate`.
    pub fn filter<F>(&self, mut predicate: F) -> ResultTable
    where
        F: FnMut(&Row<'_>) -> bool,
    {
        let rows = self
            .iter()
            .filter(|r| predicate(r))
            .map(|r| r.values().to_vec())
            .collect();
        ResultTable {
            columns: self.columns.clone(),
            rows,
        }
    }

    /// Keeps at most the first `n` rows.
    pub fn head(&self, n: usize) -> ResultTable {
        ResultTable {
            columns: self.columns.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ResultTable {
        ResultTable::from_rows(
            ["year", "race_count"],
            vec![
                vec![Value::from("2020"), Value::Int(3456)],
                vec![Value::from("2021"), Value::Int(3460)],
            ],
        )
        .unwrap()
    }

    #[test]
    fn rows_are_indexed_by_name() {
        let table = sample();
        let row = table.row(1).unwrap();
        assert_eq!(row.text("year"), Some("2021"));
        assert_eq!(row.get("race_count"), Some(&Value::Int(3460)));
        assert_eq!(row.get("missing"), None);
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let err = ResultTable::from_rows(["a", "b"], vec![vec![Value::Null]]).unwrap_err();
        assert_eq!(err, ValidationError::RowWidth { expected: 2, actual: 1 });
    }

    #[test]
    fn set_column_appends_then_replaces() {
        let mut table = sample();
        table
            .set_column("flag", vec![Value::Int(0), Value::Int(1)])
            .unwrap();
        assert_eq!(table.width(), 3);
        table
            .set_column("flag", vec![Value::Int(1), Value::Int(1)])
            .unwrap();
        assert_eq!(table.width(), 3);
        assert_eq!(table.row(0).unwrap().get("flag"), Some(&Value::Int(1)));
        assert!(table.set_column("short", vec![Value::Null]).is_err());
    }

    #[test]
    fn filter_and_drop_keep_shape() {
        let mut table = sample().filter(|r| r.text("year") == Some("2020"));
        assert_eq!(table.len(), 1);
        assert!(table.drop_column("year"));
        assert!(!table.drop_column("year"));
        assert_eq!(table.columns(), ["race_count".to_string()]);
        table.validate().unwrap();
    }
}
