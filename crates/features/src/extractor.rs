use crate::error::FeatureError;
use crate::keys::{ENTRANT_ID, RACE_ID, entrant_key, race_key};
use analytics::metrics::decode_win_odds;
use cache::{CacheKey, CacheStore};
use core_types::{Params, ResultTable, Row, Value};
use rust_decimal::prelude::ToPrimitive;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Turns race rows and entrant rows into a feature table.
///
/// `race_data` has one row per race (the `race_base` shape) and `horse_data`
/// one row per entrant (the `race_entries` shape). Output has one row per
/// entrant, keyed by `race_id` and `entrant_id`.
pub trait FeatureExtractor {
    /// Stable name, used as the cache analysis name.
    fn name(&self) -> &'static str;

    fn extract(&self, race_data: &ResultTable, horse_data: &ResultTable) -> Result<ResultTable, FeatureError>;
}

fn keyed_row(row: &Row<'_>) -> Result<Vec<Value>, FeatureError> {
    Ok(vec![
        Value::Text(race_key(row)?),
        Value::Text(entrant_key(row)?),
    ])
}

fn int_cell(row: &Row<'_>, column: &str) -> Option<i64> {
    row.get(column).and_then(Value::as_i64)
}

/// Field size per race key, from `shusso_tosu`.
fn field_sizes(race_data: &ResultTable) -> Result<HashMap<String, i64>, FeatureError> {
    let mut sizes = HashMap::with_capacity(race_data.len());
    for row in race_data.iter() {
        if let Some(size) = int_cell(&row, "shusso_tosu") {
            sizes.insert(race_key(&row)?, size);
        }
    }
    Ok(sizes)
}

/// Just the identifiers.
#[derive(Debug, Clone, Copy, Default)]
pub struct EntityKeyFeatures;

impl FeatureExtractor for EntityKeyFeatures {
    fn name(&self) -> &'static str {
        "entity_keys"
    }

    fn extract(&self, _race_data: &ResultTable, horse_data: &ResultTable) -> Result<ResultTable, FeatureError> {
        let mut out = ResultTable::new([RACE_ID, ENTRANT_ID]);
        for row in horse_data.iter() {
            out.push_row(keyed_row(&row)?)?;
        }
        Ok(out)
    }
}

/// Market features: decoded win odds, the implied win probability, the
/// popularity rank and that rank relative to the field size.
#[derive(Debug, Clone, Copy, Default)]
pub struct OddsFeatures;

impl FeatureExtractor for OddsFeatures {
    fn name(&self) -> &'static str {
        "odds"
    }

    fn extract(&self, race_data: &ResultTable, horse_data: &ResultTable) -> Result<ResultTable, FeatureError> {
        let sizes = field_sizes(race_data)?;
        let mut out = ResultTable::new([
            RACE_ID,
            ENTRANT_ID,
            "win_odds",
            "implied_probability",
            "popularity",
            "popularity_ratio",
        ]);
        for row in horse_data.iter() {
            let mut values = keyed_row(&row)?;
            let odds = row.text("tansho_odds").and_then(decode_win_odds);
            let implied = odds
                .and_then(|o| o.to_f64())
                .filter(|o| *o > 0.0)
                .map(|o| 1.0 / o);
            let popularity = int_cell(&row, "tansho_ninkijun").filter(|p| *p > 0);
            let field_size = race_key(&row).ok().and_then(|k| sizes.get(&k).copied());
            let ratio = match (popularity, field_size) {
                (Some(p), Some(n)) if n > 0 => Some(p as f64 / n as f64),
                _ => None,
            };
            values.extend([
                Value::from(odds),
                Value::from(implied),
                Value::from(popularity),
                Value::from(ratio),
            ]);
            out.push_row(values)?;
        }
        Ok(out)
    }
}

/// Body weight in kg and the signed change since the previous start.
#[derive(Debug, Clone, Copy, Default)]
pub struct BodyWeightFeatures;

impl BodyWeightFeatures {
    /// `zogen_fugo` carries the sign ("+", "-" or blank) and `zogen_sa` the magnitude.
    fn weight_change(row: &Row<'_>) -> Option<i64> {
        let magnitude = int_cell(row, "zogen_sa")?;
        match row.text("zogen_fugo").map(str::trim) {
            Some("-") => Some(-magnitude),
            Some("+") | Some("") | None => Some(magnitude),
            Some(_) => None,
        }
    }
}

impl FeatureExtractor for BodyWeightFeatures {
    fn name(&self) -> &'static str {
        "body_weight"
    }

    fn extract(&self, _race_data: &ResultTable, horse_data: &ResultTable) -> Result<ResultTable, FeatureError> {
        let mut out = ResultTable::new([RACE_ID, ENTRANT_ID, "body_weight", "weight_change"]);
        for row in horse_data.iter() {
            let mut values = keyed_row(&row)?;
            // 999 marks an unweighed horse, 0 a missing record.
            let weight = int_cell(&row, "bataiju").filter(|w| (1..999).contains(w));
            let change = weight.and(Self::weight_change(&row));
            values.extend([Value::from(weight), Value::from(change)]);
            out.push_row(values)?;
        }
        Ok(out)
    }
}

/// The available extractors.
#[derive(Debug, Clone, Copy)]
pub enum Extractor {
    EntityKeys(EntityKeyFeatures),
    Odds(OddsFeatures),
    BodyWeight(BodyWeightFeatures),
}

impl Extractor {
    pub const ALL: [Extractor; 3] = [
        Extractor::EntityKeys(EntityKeyFeatures),
        Extractor::Odds(OddsFeatures),
        Extractor::BodyWeight(BodyWeightFeatures),
    ];
}

impl FeatureExtractor for Extractor {
    fn name(&self) -> &'static str {
        match self {
            Extractor::EntityKeys(e) => e.name(),
            Extractor::Odds(e) => e.name(),
            Extractor::BodyWeight(e) => e.name(),
        }
    }

    fn extract(&self, race_data: &ResultTable, horse_data: &ResultTable) -> Result<ResultTable, FeatureError> {
        match self {
            Extractor::EntityKeys(e) => e.extract(race_data, horse_data),
            Extractor::Odds(e) => e.extract(race_data, horse_data),
            Extractor::BodyWeight(e) => e.extract(race_data, horse_data),
        }
    }
}

impl fmt::Display for Extractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Extractor {
    type Err = FeatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Extractor::ALL
            .into_iter()
            .find(|e| e.name() == s)
            .ok_or_else(|| FeatureError::Unknown {
                kind: "extractor",
                name: s.to_string(),
            })
    }
}

/// Runs `extractor` through the cache.
///
/// `inputs` must identify the data the tables were loaded with (for example
/// the year range and limit); it becomes part of the cache key together with
/// the extractor's name.
pub fn extract_cached(
    extractor: &impl FeatureExtractor,
    cache: &CacheStore,
    inputs: &Params,
    force_refresh: bool,
    race_data: &ResultTable,
    horse_data: &ResultTable,
) -> Result<ResultTable, FeatureError> {
    let analysis = format!("features_{}", extractor.name());
    let key = CacheKey::named(&analysis, inputs)?;
    cache.get_or_compute(&key, force_refresh, || -> Result<ResultTable, FeatureError> {
        let table = extractor.extract(race_data, horse_data)?;
        debug!(extractor = extractor.name(), rows = table.len(), "Extracted features");
        Ok(table)
    })
}
