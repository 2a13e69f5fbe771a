use crate::error::FeatureError;
use core_types::{ResultTable, Value};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizeMethod {
    /// `(v - min) / (max - min)`, mapping onto `[0, 1]`.
    MinMax,
    /// `(v - mean) / stddev`, with the sample (n - 1) standard deviation.
    Standard,
}

impl NormalizeMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            NormalizeMethod::MinMax => "min_max",
            NormalizeMethod::Standard => "standard",
        }
    }
}

impl fmt::Display for NormalizeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NormalizeMethod {
    type Err = FeatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "min_max" => Ok(NormalizeMethod::MinMax),
            "standard" => Ok(NormalizeMethod::Standard),
            _ => Err(FeatureError::Unknown {
                kind: "normalization method",
                name: s.to_string(),
            }),
        }
    }
}

/// Reads `column` as numbers. Nulls and blank strings are `None`; digit
/// strings are parsed, since the source tables store most numbers as text.
pub(crate) fn numeric_column(table: &ResultTable, column: &str) -> Result<Vec<Option<f64>>, FeatureError> {
    let values = table
        .column_values(column)
        .ok_or_else(|| FeatureError::MissingColumn(column.to_string()))?;
    values
        .enumerate()
        .map(|(row, value)| match value {
            Value::Null => Ok(None),
            Value::Text(text) if text.trim().is_empty() => Ok(None),
            other => other
                .as_f64()
                .filter(|v| v.is_finite())
                .map(Some)
                .ok_or_else(|| FeatureError::NonNumeric {
                    column: column.to_string(),
                    row,
                }),
        })
        .collect()
}

/// Appends `{column}_norm`. Missing values stay null.
///
/// Fails with [`FeatureError::DegenerateRange`] instead of dividing by zero
/// when the column is constant, or when it has too few values for the
/// method (one for min-max, two for standard).
pub fn normalize(table: &mut ResultTable, column: &str, method: NormalizeMethod) -> Result<(), FeatureError> {
    let values = numeric_column(table, column)?;
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    let degenerate = || FeatureError::DegenerateRange {
        column: column.to_string(),
        method: method.as_str(),
    };

    let (offset, scale) = match method {
        NormalizeMethod::MinMax => {
            let min = present.iter().copied().reduce(f64::min).ok_or_else(degenerate)?;
            let max = present.iter().copied().reduce(f64::max).ok_or_else(degenerate)?;
            (min, max - min)
        }
        NormalizeMethod::Standard => {
            if present.len() < 2 {
                return Err(degenerate());
            }
            let n = present.len() as f64;
            let mean = present.iter().sum::<f64>() / n;
            let variance = present.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
            (mean, variance.sqrt())
        }
    };
    if scale == 0.0 || !scale.is_finite() {
        return Err(degenerate());
    }

    let normalized = values
        .into_iter()
        .map(|v| v.map_or(Value::Null, |v| Value::Float((v - offset) / scale)))
        .collect();
    table.set_column(&format!("{column}_norm"), normalized)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(values: Vec<Value>) -> ResultTable {
        ResultTable::from_rows(["bataiju"], values.into_iter().map(|v| vec![v]).collect()).unwrap()
    }

    fn normalized(table: &ResultTable) -> Vec<Option<f64>> {
        table
            .column_values("bataiju_norm")
            .unwrap()
            .map(Value::as_f64)
            .collect()
    }

    #[test]
    fn min_max_maps_onto_unit_interval() {
        let mut table = column(vec![Value::Int(10), Value::Int(15), Value::Int(20)]);
        normalize(&mut table, "bataiju", NormalizeMethod::MinMax).unwrap();
        assert_eq!(normalized(&table), vec![Some(0.0), Some(0.5), Some(1.0)]);
    }

    #[test]
    fn text_numbers_are_parsed_and_nulls_kept() {
        let mut table = column(vec![
            Value::from("480"),
            Value::Null,
            Value::from("  "),
            Value::from("500"),
        ]);
        normalize(&mut table, "bataiju", NormalizeMethod::MinMax).unwrap();
        assert_eq!(normalized(&table), vec![Some(0.0), None, None, Some(1.0)]);
    }

    #[test]
    fn standard_uses_sample_deviation() {
        let mut table = column(vec![Value::Int(2), Value::Int(4), Value::Int(6)]);
        normalize(&mut table, "bataiju", NormalizeMethod::Standard).unwrap();
        // mean 4, sample stddev 2
        assert_eq!(normalized(&table), vec![Some(-1.0), Some(0.0), Some(1.0)]);
    }

    #[test]
    fn constant_column_is_degenerate() {
        for method in [NormalizeMethod::MinMax, NormalizeMethod::Standard] {
            let mut table = column(vec![Value::Int(7), Value::Int(7), Value::Int(7)]);
            let err = normalize(&mut table, "bataiju", method).unwrap_err();
            assert!(matches!(err, FeatureError::DegenerateRange { .. }), "{method}");
            assert!(!table.has_column("bataiju_norm"));
        }
    }

    #[test]
    fn too_few_values_are_degenerate() {
        let mut empty = column(vec![Value::Null]);
        assert!(matches!(
            normalize(&mut empty, "bataiju", NormalizeMethod::MinMax),
            Err(FeatureError::DegenerateRange { .. })
        ));
        let mut single = column(vec![Value::Int(480)]);
        assert!(matches!(
            normalize(&mut single, "bataiju", NormalizeMethod::Standard),
            Err(FeatureError::DegenerateRange { .. })
        ));
    }

    #[test]
    fn non_numeric_text_is_an_error() {
        let mut table = column(vec![Value::Int(480), Value::from("abc")]);
        assert!(matches!(
            normalize(&mut table, "bataiju", NormalizeMethod::MinMax),
            Err(FeatureError::NonNumeric { row: 1, .. })
        ));
        assert!(matches!(
            normalize(&mut table, "missing", NormalizeMethod::MinMax),
            Err(FeatureError::MissingColumn(_))
        ));
    }

    #[test]
    fn methods_parse_from_their_names() {
        assert_eq!("min_max".parse::<NormalizeMethod>().unwrap(), NormalizeMethod::MinMax);
        assert_eq!("standard".parse::<NormalizeMethod>().unwrap(), NormalizeMethod::Standard);
        assert!("zscore".parse::<NormalizeMethod>().is_err());
    }
}
