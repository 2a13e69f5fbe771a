//! Win rate, top-3 rate, ROI and ROI grade.
//!
//! Aggregate queries return raw counts (`total_races`, `wins`, `top3`) and the
//! unrounded `payout_sum`; every derived figure is computed here. The in-memory
//! aggregations in the features crate go through the same [`AggregateCounts`],
//! so a group gives the same numbers whichever path produced it.

use crate::error::AnalyticsError;
use core_types::{ResultTable, RoiRank, Row, Value, parse_finish_position};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

pub const TOTAL_RACES: &str = "total_races";
pub const WINS: &str = "wins";
pub const TOP3: &str = "top3";
pub const PAYOUT_SUM: &str = "payout_sum";
pub const WIN_RATE: &str = "win_rate";
pub const TOP3_RATE: &str = "top3_rate";
pub const ROI: &str = "roi";
pub const ROI_RANK: &str = "roi_rank";

/// Win odds are stored as digit strings scaled by ten ("35" is 3.5).
pub const ODDS_SCALE: Decimal = Decimal::from_parts(10, 0, 0, false, 0);

/// Rounds to two decimal places, half away from zero (PostgreSQL `ROUND`).
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// `round2(part / total * 100)`, or zero for an empty group.
pub fn percentage(part: Decimal, total: i64) -> Decimal {
    if total <= 0 {
        return Decimal::ZERO;
    }
    (part * Decimal::ONE_HUNDRED)
        .checked_div(Decimal::from(total))
        .map_or(Decimal::ZERO, round2)
}

/// Decodes a raw win-odds string into the payout per unit staked.
///
/// Only plain digit strings are odds; anything else ("----", blank, signs or
/// decimal points) is unreadable, matching the digit check in the SQL.
pub fn decode_win_odds(raw: &str) -> Option<Decimal> {
    let raw = raw.trim();
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let odds = raw.parse::<Decimal>().ok()?;
    odds.checked_div(ODDS_SCALE)
}

/// Raw counts for one group of entrant rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregateCounts {
    pub total_races: i64,
    pub wins: i64,
    pub top3: i64,
    /// Sum of decoded win odds over the winning rows.
    pub payout_sum: Decimal,
}

impl AggregateCounts {
    /// Counts one entrant row. Returns `false` (and counts nothing) when the
    /// finishing position is not a real place.
    ///
    /// A winner with unreadable odds still counts as a win but pays nothing.
    pub fn record(&mut self, finish_position: &str, win_odds: Option<&str>) -> bool {
        let Some(place) = parse_finish_position(finish_position) else {
            return false;
        };
        self.total_races += 1;
        if place <= 3 {
            self.top3 += 1;
        }
        if place == 1 {
            self.wins += 1;
            if let Some(payout) = win_odds.and_then(decode_win_odds) {
                self.payout_sum += payout;
            }
        }
        true
    }

    /// Reads the raw count columns of an aggregate query row.
    pub fn from_row(row: &Row<'_>, index: usize) -> Result<Self, AnalyticsError> {
        Ok(Self {
            total_races: count_cell(row, TOTAL_RACES, index)?,
            wins: count_cell(row, WINS, index)?,
            top3: count_cell(row, TOP3, index)?,
            payout_sum: decimal_cell(row, PAYOUT_SUM, index)?,
        })
    }

    pub fn win_rate(&self) -> Decimal {
        percentage(Decimal::from(self.wins), self.total_races)
    }

    pub fn top3_rate(&self) -> Decimal {
        percentage(Decimal::from(self.top3), self.total_races)
    }

    pub fn roi(&self) -> Decimal {
        percentage(self.payout_sum, self.total_races)
    }

    pub fn roi_rank(&self) -> RoiRank {
        RoiRank::from_roi(self.roi())
    }
}

fn count_cell(row: &Row<'_>, column: &str, index: usize) -> Result<i64, AnalyticsError> {
    match row.get(column) {
        None => Err(AnalyticsError::MissingColumn(column.to_string())),
        Some(Value::Null) => Ok(0),
        Some(value) => value.as_i64().ok_or_else(|| AnalyticsError::NonNumeric {
            column: column.to_string(),
            row: index,
        }),
    }
}

fn decimal_cell(row: &Row<'_>, column: &str, index: usize) -> Result<Decimal, AnalyticsError> {
    match row.get(column) {
        None => Err(AnalyticsError::MissingColumn(column.to_string())),
        Some(Value::Null) => Ok(Decimal::ZERO),
        Some(value) => value.as_decimal().ok_or_else(|| AnalyticsError::NonNumeric {
            column: column.to_string(),
            row: index,
        }),
    }
}

/// Appends `win_rate`, `top3_rate`, `roi` and `roi_rank` to an aggregate
/// result and drops the intermediate `payout_sum` column. Row order is kept.
pub fn derive_rate_columns(table: &mut ResultTable) -> Result<(), AnalyticsError> {
    let mut win_rates = Vec::with_capacity(table.len());
    let mut top3_rates = Vec::with_capacity(table.len());
    let mut rois = Vec::with_capacity(table.len());
    let mut ranks = Vec::with_capacity(table.len());

    for (index, row) in table.iter().enumerate() {
        let counts = AggregateCounts::from_row(&row, index)?;
        win_rates.push(Value::Decimal(counts.win_rate()));
        top3_rates.push(Value::Decimal(counts.top3_rate()));
        rois.push(Value::Decimal(counts.roi()));
        ranks.push(Value::from(counts.roi_rank().as_str()));
    }

    table.set_column(WIN_RATE, win_rates)?;
    table.set_column(TOP3_RATE, top3_rates)?;
    table.set_column(ROI, rois)?;
    table.set_column(ROI_RANK, ranks)?;
    table.drop_column(PAYOUT_SUM);
    Ok(())
}

/// Typed view of one aggregate group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateRecord {
    /// Grouping columns in the order they were requested.
    pub keys: Vec<(String, Value)>,
    pub total_races: i64,
    pub wins: i64,
    pub top3: i64,
    pub win_rate: Decimal,
    pub top3_rate: Decimal,
    pub roi: Decimal,
    pub roi_rank: RoiRank,
}

impl AggregateRecord {
    pub fn new(keys: Vec<(String, Value)>, counts: &AggregateCounts) -> Self {
        Self {
            keys,
            total_races: counts.total_races,
            wins: counts.wins,
            top3: counts.top3,
            win_rate: counts.win_rate(),
            top3_rate: counts.top3_rate(),
            roi: counts.roi(),
            roi_rank: counts.roi_rank(),
        }
    }

    /// Lays records out as a table: key columns, then the counts and rates.
    pub fn to_table(
        key_columns: &[&str],
        records: &[AggregateRecord],
    ) -> Result<ResultTable, AnalyticsError> {
        let columns = key_columns
            .iter()
            .copied()
            .chain([TOTAL_RACES, WINS, TOP3, WIN_RATE, TOP3_RATE, ROI, ROI_RANK]);
        let rows = records
            .iter()
            .map(|r| {
                let mut row: Vec<Value> = r.keys.iter().map(|(_, v)| v.clone()).collect();
                row.extend([
                    Value::Int(r.total_races),
                    Value::Int(r.wins),
                    Value::Int(r.top3),
                    Value::Decimal(r.win_rate),
                    Value::Decimal(r.top3_rate),
                    Value::Decimal(r.roi),
                    Value::from(r.roi_rank.as_str()),
                ]);
                row
            })
            .collect();
        Ok(ResultTable::from_rows(columns, rows)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    /// Ten entrants, two winners paying 3.0 and 5.0.
    fn ten_row_sample() -> Vec<(&'static str, &'static str)> {
        vec![
            ("01", "30"),
            ("02", "45"),
            ("03", "120"),
            ("04", "88"),
            ("05", "210"),
            ("01", "50"),
            ("06", "33"),
            ("07", "990"),
            ("08", "61"),
            ("10", "15"),
        ]
    }

    #[test]
    fn round2_is_half_away_from_zero() {
        assert_eq!(round2(dec!(0.125)), dec!(0.13));
        assert_eq!(round2(dec!(0.124)), dec!(0.12));
        assert_eq!(round2(dec!(-0.125)), dec!(-0.13));
        assert_eq!(round2(dec!(66.665)), dec!(66.67));
    }

    #[test]
    fn ten_row_sample_gives_roi_80() {
        let mut counts = AggregateCounts::default();
        for (finish, odds) in ten_row_sample() {
            assert!(counts.record(finish, Some(odds)));
        }
        assert_eq!(counts.total_races, 10);
        assert_eq!(counts.wins, 2);
        assert_eq!(counts.top3, 4);
        assert_eq!(counts.payout_sum, dec!(8.0));
        assert_eq!(counts.roi(), dec!(80.00));
        assert_eq!(counts.win_rate(), dec!(20.00));
        assert_eq!(counts.top3_rate(), dec!(40.00));
        assert_eq!(counts.roi_rank(), RoiRank::C);
    }

    #[test]
    fn invalid_finishes_are_not_counted() {
        let mut counts = AggregateCounts::default();
        for raw in ["00", "99", "", "DQ", "1a", "0"] {
            assert!(!counts.record(raw, Some("30")), "{raw:?}");
        }
        assert_eq!(counts, AggregateCounts::default());
        assert_eq!(counts.roi(), Decimal::ZERO);
        assert_eq!(counts.win_rate(), Decimal::ZERO);
    }

    #[test]
    fn winner_with_unreadable_odds_pays_nothing() {
        let mut counts = AggregateCounts::default();
        counts.record("01", Some("----"));
        counts.record("01", None);
        counts.record("01", Some(""));
        counts.record("01", Some("2.5"));
        counts.record("01", Some("-30"));
        assert_eq!(counts.wins, 5);
        assert_eq!(counts.roi(), Decimal::ZERO);
    }

    #[test]
    fn odds_decode_only_from_digit_strings() {
        assert_eq!(decode_win_odds("0030"), Some(dec!(3.0)));
        assert_eq!(decode_win_odds(" 125 "), Some(dec!(12.5)));
        for unreadable in ["----", "", "   ", "2.5", "+30", "-30", "3O"] {
            assert_eq!(decode_win_odds(unreadable), None, "{unreadable:?}");
        }
    }

    #[test]
    fn derives_columns_from_sql_counts() {
        let mut table = ResultTable::from_rows(
            ["keibajo_code", TOTAL_RACES, WINS, TOP3, PAYOUT_SUM],
            vec![
                vec![
                    Value::from("05"),
                    Value::Int(10),
                    Value::Int(2),
                    Value::Int(4),
                    Value::Decimal(dec!(8.0000000000000000)),
                ],
                vec![
                    Value::from("06"),
                    Value::Int(3),
                    Value::Int(0),
                    Value::Int(1),
                    Value::Null,
                ],
            ],
        )
        .unwrap();

        derive_rate_columns(&mut table).unwrap();

        assert!(!table.has_column(PAYOUT_SUM));
        let first = table.row(0).unwrap();
        assert_eq!(first.get(ROI), Some(&Value::Decimal(dec!(80.00))));
        assert_eq!(first.get(WIN_RATE), Some(&Value::Decimal(dec!(20.00))));
        assert_eq!(first.text(ROI_RANK), Some("C"));
        let second = table.row(1).unwrap();
        assert_eq!(second.get(TOP3_RATE), Some(&Value::Decimal(dec!(33.33))));
        assert_eq!(second.text(ROI_RANK), Some("D"));
    }

    #[test]
    fn sql_and_in_memory_paths_agree() {
        let mut counts = AggregateCounts::default();
        for (finish, odds) in ten_row_sample() {
            counts.record(finish, Some(odds));
        }
        let mut from_sql = ResultTable::from_rows(
            [TOTAL_RACES, WINS, TOP3, PAYOUT_SUM],
            vec![vec![
                Value::Int(10),
                Value::Int(2),
                Value::Int(4),
                // PostgreSQL returns SUM(CAST(odds AS NUMERIC) / 10) with extra scale.
                Value::Decimal(dec!(8.00000000000000000000)),
            ]],
        )
        .unwrap();
        derive_rate_columns(&mut from_sql).unwrap();

        let in_memory = AggregateRecord::to_table(&[], &[AggregateRecord::new(vec![], &counts)]).unwrap();
        for column in [WIN_RATE, TOP3_RATE, ROI, ROI_RANK] {
            assert_eq!(
                from_sql.row(0).unwrap().get(column),
                in_memory.row(0).unwrap().get(column),
                "{column}"
            );
        }
    }

    #[test]
    fn missing_count_column_is_reported() {
        let mut table = ResultTable::from_rows(
            [TOTAL_RACES, WINS],
            vec![vec![Value::Int(1), Value::Int(1)]],
        )
        .unwrap();
        assert!(matches!(
            derive_rate_columns(&mut table),
            Err(AnalyticsError::MissingColumn(c)) if c == TOP3
        ));
    }

    #[test]
    fn empty_result_gets_empty_rate_columns() {
        let mut table = ResultTable::default();
        derive_rate_columns(&mut table).unwrap();
        assert!(table.is_empty());
        assert!(table.has_column(ROI_RANK));
    }

    /// Lower (inclusive) and upper (exclusive) roi bounds of each grade.
    fn grade_interval(rank: RoiRank) -> (Option<Decimal>, Option<Decimal>) {
        match rank {
            RoiRank::S => (Some(dec!(200)), None),
            RoiRank::A => (Some(dec!(100)), Some(dec!(200))),
            RoiRank::B => (Some(dec!(70)), Some(dec!(100))),
            RoiRank::C => (Some(dec!(50)), Some(dec!(70))),
            RoiRank::D => (None, Some(dec!(50))),
        }
    }

    proptest! {
        #[test]
        fn prop_rates_are_bounded(total in 1i64..500, wins_frac in 0.0f64..=1.0, extra_frac in 0.0f64..=1.0) {
            let wins = ((total as f64) * wins_frac).floor() as i64;
            let top3 = wins + (((total - wins) as f64) * extra_frac).floor() as i64;
            let counts = AggregateCounts { total_races: total, wins, top3, payout_sum: Decimal::ZERO };
            let win_rate = counts.win_rate();
            prop_assert!(win_rate >= Decimal::ZERO && win_rate <= Decimal::ONE_HUNDRED);
            prop_assert!(counts.top3_rate() >= win_rate);
        }

        #[test]
        fn prop_roi_rank_is_a_partition(cents in 0i64..100_000) {
            let roi = Decimal::new(cents, 2);
            let matching: Vec<RoiRank> = [RoiRank::S, RoiRank::A, RoiRank::B, RoiRank::C, RoiRank::D]
                .into_iter()
                .filter(|rank| {
                    let (lower, upper) = grade_interval(*rank);
                    lower.is_none_or(|l| roi >= l) && upper.is_none_or(|u| roi < u)
                })
                .collect();
            prop_assert_eq!(matching.len(), 1);
            prop_assert_eq!(matching[0], RoiRank::from_roi(roi));
        }
    }
}
