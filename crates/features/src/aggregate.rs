//! In-memory counterparts of the SQL aggregates.
//!
//! Rows are counted with [`AggregateCounts`], the same type that derives rates
//! from SQL results, so a group gives identical figures on either path.

use crate::error::FeatureError;
use analytics::{AggregateCounts, AggregateRecord};
use core_types::{ResultTable, Value};
use rust_decimal::Decimal;
use std::collections::HashMap;

pub const FINISH_POSITION: &str = "kakutei_chakujun";
pub const WIN_ODDS: &str = "tansho_odds";

fn require(table: &ResultTable, column: &str) -> Result<usize, FeatureError> {
    table
        .column_index(column)
        .ok_or_else(|| FeatureError::MissingColumn(column.to_string()))
}

/// Counts the rows of `rows`, skipping those without a real finishing place.
pub fn group_counts(rows: &ResultTable) -> Result<AggregateCounts, FeatureError> {
    let finish = require(rows, FINISH_POSITION)?;
    let odds = rows.column_index(WIN_ODDS);
    let mut counts = AggregateCounts::default();
    for row in rows.iter() {
        let values = row.values();
        let Some(position) = values[finish].as_str() else {
            continue;
        };
        counts.record(position, odds.and_then(|i| values[i].as_str()));
    }
    Ok(counts)
}

/// Win percentage of a group, 0 for an empty group.
pub fn group_win_rate(rows: &ResultTable) -> Result<Decimal, FeatureError> {
    Ok(group_counts(rows)?.win_rate())
}

pub fn group_top3_rate(rows: &ResultTable) -> Result<Decimal, FeatureError> {
    Ok(group_counts(rows)?.top3_rate())
}

/// Return on win bets as a percentage, 0 for an empty group.
pub fn group_roi(rows: &ResultTable) -> Result<Decimal, FeatureError> {
    require(rows, WIN_ODDS)?;
    Ok(group_counts(rows)?.roi())
}

/// Groups `table` by `keys` and derives the same columns as the SQL aggregates.
///
/// Groups with fewer than `min_races` counted rows are dropped. Output is
/// ordered by unrounded ROI, highest first; ties keep first-seen order.
pub fn aggregate_by(table: &ResultTable, keys: &[&str], min_races: i64) -> Result<ResultTable, FeatureError> {
    let key_indices = keys
        .iter()
        .map(|k| require(table, k))
        .collect::<Result<Vec<_>, _>>()?;
    let finish = require(table, FINISH_POSITION)?;
    let odds = require(table, WIN_ODDS)?;

    let mut slots: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<(Vec<Value>, AggregateCounts)> = Vec::new();
    for row in table.iter() {
        let values = row.values();
        let key_values: Vec<Value> = key_indices.iter().map(|&i| values[i].clone()).collect();
        // Debug output tells Text("NULL") apart from Null and 1 from "1".
        let slot = *slots.entry(format!("{key_values:?}")).or_insert_with(|| {
            groups.push((key_values, AggregateCounts::default()));
            groups.len() - 1
        });
        if let Some(position) = values[finish].as_str() {
            groups[slot].1.record(position, values[odds].as_str());
        }
    }

    let mut kept: Vec<(Vec<Value>, AggregateCounts)> = groups
        .into_iter()
        .filter(|(_, counts)| counts.total_races > 0 && counts.total_races >= min_races)
        .collect();
    // payout_a / total_a vs payout_b / total_b without rounding.
    kept.sort_by(|(_, a), (_, b)| {
        let lhs = b.payout_sum * Decimal::from(a.total_races);
        let rhs = a.payout_sum * Decimal::from(b.total_races);
        lhs.cmp(&rhs)
    });

    let records: Vec<AggregateRecord> = kept
        .into_iter()
        .map(|(key_values, counts)| {
            let named = keys.iter().map(|k| k.to_string()).zip(key_values).collect();
            AggregateRecord::new(named, &counts)
        })
        .collect();
    Ok(AggregateRecord::to_table(keys, &records)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use analytics::metrics::{ROI, ROI_RANK, TOTAL_RACES, WIN_RATE};
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn entrants(rows: &[(&str, &str, &str)]) -> ResultTable {
        ResultTable::from_rows(
            ["kishu_code", FINISH_POSITION, WIN_ODDS],
            rows.iter()
                .map(|(jockey, finish, odds)| {
                    vec![Value::from(*jockey), Value::from(*finish), Value::from(*odds)]
                })
                .collect(),
        )
        .unwrap()
    }

    fn ten_rows() -> ResultTable {
        entrants(&[
            ("01126", "01", "30"),
            ("01126", "02", "45"),
            ("01126", "03", "120"),
            ("01126", "04", "88"),
            ("01126", "05", "210"),
            ("01126", "01", "50"),
            ("01126", "06", "33"),
            ("01126", "07", "990"),
            ("01126", "08", "61"),
            ("01126", "10", "15"),
        ])
    }

    #[test]
    fn ten_row_sample_roi_is_80() {
        let rows = ten_rows();
        assert_eq!(group_roi(&rows).unwrap(), dec!(80.00));
        assert_eq!(group_win_rate(&rows).unwrap(), dec!(20.00));
        assert_eq!(group_top3_rate(&rows).unwrap(), dec!(40.00));
    }

    #[test]
    fn matches_the_sql_derivation_on_the_same_rows() {
        // What the SQL aggregate returns for these ten rows before derivation.
        let mut from_sql = ResultTable::from_rows(
            ["kishu_code", "total_races", "wins", "top3", "payout_sum"],
            vec![vec![
                Value::from("01126"),
                Value::Int(10),
                Value::Int(2),
                Value::Int(4),
                Value::Decimal(dec!(8.0000000000000000)),
            ]],
        )
        .unwrap();
        analytics::derive_rate_columns(&mut from_sql).unwrap();

        let in_memory = aggregate_by(&ten_rows(), &["kishu_code"], 1).unwrap();
        assert_eq!(in_memory, from_sql);
    }

    #[test]
    fn sentinels_and_junk_are_not_counted() {
        let rows = entrants(&[
            ("01126", "01", "30"),
            ("01126", "00", "50"),
            ("01126", "99", "50"),
            ("01126", "", "50"),
            ("01126", "取消", "50"),
        ]);
        let counts = group_counts(&rows).unwrap();
        assert_eq!(counts.total_races, 1);
        assert_eq!(counts.wins, 1);
        assert_eq!(group_win_rate(&rows).unwrap(), dec!(100.00));
    }

    #[test]
    fn empty_group_is_zero() {
        let rows = entrants(&[]);
        assert_eq!(group_win_rate(&rows).unwrap(), Decimal::ZERO);
        assert_eq!(group_roi(&rows).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn groups_below_threshold_are_dropped_and_order_is_by_roi() {
        let rows = entrants(&[
            ("00666", "01", "20"),
            ("00666", "02", "20"),
            ("01126", "01", "90"),
            ("01126", "03", "40"),
            ("05339", "01", "500"),
        ]);
        let table = aggregate_by(&rows, &["kishu_code"], 2).unwrap();
        assert_eq!(table.len(), 2);
        let first = table.row(0).unwrap();
        assert_eq!(first.text("kishu_code"), Some("01126"));
        assert_eq!(first.get(ROI), Some(&Value::Decimal(dec!(450.00))));
        assert_eq!(first.text(ROI_RANK), Some("S"));
        let second = table.row(1).unwrap();
        assert_eq!(second.get(TOTAL_RACES), Some(&Value::Int(2)));
        assert_eq!(second.get(WIN_RATE), Some(&Value::Decimal(dec!(50.00))));
    }

    #[test]
    fn missing_columns_are_reported() {
        let rows = entrants(&[("01126", "01", "30")]);
        assert!(matches!(
            aggregate_by(&rows, &["keibajo_code"], 1),
            Err(FeatureError::MissingColumn(c)) if c == "keibajo_code"
        ));
    }

    proptest! {
        #[test]
        fn prop_group_rates_are_bounded(finishes in proptest::collection::vec(0u32..20, 1..60)) {
            let raw: Vec<String> = finishes.iter().map(|f| format!("{f:02}")).collect();
            let rows: Vec<(&str, &str, &str)> = raw.iter().map(|f| ("01126", f.as_str(), "25")).collect();
            let table = entrants(&rows);
            let win_rate = group_win_rate(&table).unwrap();
            prop_assert!(win_rate >= Decimal::ZERO && win_rate <= Decimal::ONE_HUNDRED);
            prop_assert!(group_top3_rate(&table).unwrap() >= win_rate);
        }
    }
}
