use crate::error::FeatureError;
use core_types::{ResultTable, Value};
use std::collections::BTreeSet;

/// Appends one 0/1 indicator column per distinct value of `column`, named
/// `{prefix}_{value}` (`prefix` defaults to the column name). Columns come out
/// in sorted value order; a null row is 0 in every indicator.
pub fn one_hot(table: &mut ResultTable, column: &str, prefix: Option<&str>) -> Result<(), FeatureError> {
    let labels: Vec<Option<String>> = table
        .column_values(column)
        .ok_or_else(|| FeatureError::MissingColumn(column.to_string()))?
        .map(|v| (!v.is_null()).then(|| v.to_string()))
        .collect();
    let categories: BTreeSet<&str> = labels.iter().flatten().map(String::as_str).collect();

    let prefix = prefix.unwrap_or(column);
    for category in categories {
        let indicator = labels
            .iter()
            .map(|label| Value::Int(i64::from(label.as_deref() == Some(category))))
            .collect();
        table.set_column(&format!("{prefix}_{category}"), indicator)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_column_per_category() {
        let mut table = ResultTable::from_rows(
            ["tenko_code"],
            vec![
                vec![Value::from("2")],
                vec![Value::from("1")],
                vec![Value::Null],
                vec![Value::from("2")],
            ],
        )
        .unwrap();
        one_hot(&mut table, "tenko_code", Some("weather")).unwrap();

        assert_eq!(table.columns(), ["tenko_code", "weather_1", "weather_2"]);
        let fine: Vec<_> = table.column_values("weather_1").unwrap().cloned().collect();
        assert_eq!(fine, [Value::Int(0), Value::Int(1), Value::Int(0), Value::Int(0)]);
        let cloudy: Vec<_> = table.column_values("weather_2").unwrap().cloned().collect();
        assert_eq!(cloudy, [Value::Int(1), Value::Int(0), Value::Int(0), Value::Int(1)]);
    }

    #[test]
    fn prefix_defaults_to_the_column() {
        let mut table =
            ResultTable::from_rows(["keibajo_code"], vec![vec![Value::from("05")]]).unwrap();
        one_hot(&mut table, "keibajo_code", None).unwrap();
        assert!(table.has_column("keibajo_code_05"));
        assert!(one_hot(&mut table, "missing", None).is_err());
    }
}
