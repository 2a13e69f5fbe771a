//! Race and entrant identifiers.
//!
//! A race key is `{year}{month_day}{venue}{race_no}` ("202101010512" is
//! race 12 at Tokyo on 2021-01-01) and an entrant key appends
//! `_{horse_id}`. The fields are concatenated without separators, so each one
//! must have its fixed width for keys to stay collision free.

use crate::error::FeatureError;
use core_types::{ResultTable, Row, Value};

/// Race key fields and their widths.
pub const RACE_KEY_FIELDS: [(&str, usize); 4] = [
    ("kaisai_nen", 4),
    ("kaisai_tsukihi", 4),
    ("keibajo_code", 2),
    ("race_bango", 2),
];

pub const HORSE_ID: &str = "ketto_toroku_bango";
pub const RACE_ID: &str = "race_id";
pub const ENTRANT_ID: &str = "entrant_id";

fn field<'a>(row: &Row<'a>, name: &str) -> Result<&'a str, FeatureError> {
    match row.get(name) {
        Some(Value::Text(text)) => Ok(text.as_str()),
        Some(other) => Err(FeatureError::MalformedKey {
            field: name.to_string(),
            value: other.to_string(),
        }),
        None => Err(FeatureError::MissingColumn(name.to_string())),
    }
}

pub fn race_key(row: &Row<'_>) -> Result<String, FeatureError> {
    let mut key = String::with_capacity(12);
    for (name, width) in RACE_KEY_FIELDS {
        let value = field(row, name)?;
        if value.len() != width || !value.bytes().all(|b| b.is_ascii_digit()) {
            return Err(FeatureError::MalformedKey {
                field: name.to_string(),
                value: value.to_string(),
            });
        }
        key.push_str(value);
    }
    Ok(key)
}

pub fn entrant_key(row: &Row<'_>) -> Result<String, FeatureError> {
    let race = race_key(row)?;
    let horse = field(row, HORSE_ID)?;
    if horse.is_empty() || !horse.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return Err(FeatureError::MalformedKey {
            field: HORSE_ID.to_string(),
            value: horse.to_string(),
        });
    }
    Ok(format!("{race}_{horse}"))
}

/// Returns a copy of `table` with a `race_id` column, plus `entrant_id` when
/// the table has a horse identifier column.
pub fn with_entity_keys(table: &ResultTable) -> Result<ResultTable, FeatureError> {
    let with_entrants = table.has_column(HORSE_ID);
    let mut race_ids = Vec::with_capacity(table.len());
    let mut entrant_ids = Vec::with_capacity(table.len());
    for row in table.iter() {
        race_ids.push(Value::Text(race_key(&row)?));
        if with_entrants {
            entrant_ids.push(Value::Text(entrant_key(&row)?));
        }
    }

    let mut keyed = table.clone();
    keyed.set_column(RACE_ID, race_ids)?;
    if with_entrants {
        keyed.set_column(ENTRANT_ID, entrant_ids)?;
    }
    Ok(keyed)
}
