use crate::error::FeatureError;
use crate::normalize::numeric_column;
use core_types::{ResultTable, Value};

/// Label given to values that fall outside every bin.
pub const UNBINNED: &str = "unbinned";

fn validate(boundaries: &[f64], labels: Option<&[&str]>) -> Result<(), FeatureError> {
    if boundaries.len() < 2 {
        return Err(FeatureError::InvalidBins(
            "at least two boundaries are required".to_string(),
        ));
    }
    if boundaries.iter().any(|b| !b.is_finite()) {
        return Err(FeatureError::InvalidBins("boundaries must be finite".to_string()));
    }
    if boundaries.windows(2).any(|w| w[0] >= w[1]) {
        return Err(FeatureError::InvalidBins(
            "boundaries must be strictly ascending".to_string(),
        ));
    }
    if let Some(labels) = labels {
        if labels.len() != boundaries.len() - 1 {
            return Err(FeatureError::InvalidBins(format!(
                "{} labels for {} bins",
                labels.len(),
                boundaries.len() - 1
            )));
        }
    }
    Ok(())
}

/// Index of the bin `(boundaries[i], boundaries[i + 1]]` holding `value`.
fn bin_index(boundaries: &[f64], value: f64) -> Option<usize> {
    let last = boundaries.len() - 1;
    if value <= boundaries[0] || value > boundaries[last] {
        return None;
    }
    // First upper bound that is >= value.
    let upper = boundaries.partition_point(|b| *b < value);
    Some(upper - 1)
}

/// Appends `{column}_bin` holding each value's bin label.
///
/// Bins are right-closed: with boundaries `[0, 1400, 2000]` the value 1400
/// falls in the first bin and 0 falls in none. Values outside every bin get
/// [`UNBINNED`]; nulls stay null. Without `labels` the bin index is used.
pub fn bin(
    table: &mut ResultTable,
    column: &str,
    boundaries: &[f64],
    labels: Option<&[&str]>,
) -> Result<(), FeatureError> {
    validate(boundaries, labels)?;
    let values = numeric_column(table, column)?;

    let binned = values
        .into_iter()
        .map(|value| {
            let Some(value) = value else {
                return Value::Null;
            };
            match (bin_index(boundaries, value), labels) {
                (Some(i), Some(labels)) => Value::from(labels[i]),
                (Some(i), None) => Value::Text(i.to_string()),
                (None, _) => Value::from(UNBINNED),
            }
        })
        .collect();
    table.set_column(&format!("{column}_bin"), binned)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const DISTANCE_BINS: [f64; 4] = [0.0, 1400.0, 2000.0, 4000.0];

    fn distances(values: &[&str]) -> ResultTable {
        ResultTable::from_rows(
            ["kyori"],
            values.iter().map(|v| vec![Value::from(*v)]).collect(),
        )
        .unwrap()
    }

    fn labels_of(table: &ResultTable) -> Vec<String> {
        table
            .column_values("kyori_bin")
            .unwrap()
            .map(|v| v.to_string())
            .collect()
    }

    #[test]
    fn bins_are_right_closed() {
        let mut table = distances(&["1000", "1400", "1401", "2000", "3600"]);
        bin(&mut table, "kyori", &DISTANCE_BINS, Some(&["short", "middle", "long"])).unwrap();
        assert_eq!(labels_of(&table), ["short", "short", "middle", "middle", "long"]);
    }

    #[test]
    fn out_of_range_values_are_marked() {
        let mut table = distances(&["0", "-5", "4001", "1200"]);
        bin(&mut table, "kyori", &DISTANCE_BINS, None).unwrap();
        assert_eq!(labels_of(&table), [UNBINNED, UNBINNED, UNBINNED, "0"]);
    }

    #[test]
    fn nulls_stay_null() {
        let mut table = ResultTable::from_rows(["kyori"], vec![vec![Value::Null]]).unwrap();
        bin(&mut table, "kyori", &DISTANCE_BINS, None).unwrap();
        assert_eq!(table.row(0).unwrap().get("kyori_bin"), Some(&Value::Null));
    }

    #[test]
    fn invalid_bins_are_rejected() {
        let mut table = distances(&["1000"]);
        assert!(bin(&mut table, "kyori", &[1.0], None).is_err());
        assert!(bin(&mut table, "kyori", &[0.0, 2000.0, 1400.0], None).is_err());
        assert!(bin(&mut table, "kyori", &[0.0, 0.0, 1.0], None).is_err());
        assert!(bin(&mut table, "kyori", &DISTANCE_BINS, Some(&["short"])).is_err());
        assert!(!table.has_column("kyori_bin"));
    }

    proptest! {
        #[test]
        fn prop_bin_index_respects_its_interval(value in -100.0f64..5000.0) {
            match bin_index(&DISTANCE_BINS, value) {
                Some(i) => {
                    prop_assert!(DISTANCE_BINS[i] < value);
                    prop_assert!(value <= DISTANCE_BINS[i + 1]);
                }
                None => prop_assert!(value <= DISTANCE_BINS[0] || value > DISTANCE_BINS[3]),
            }
        }
    }
}
