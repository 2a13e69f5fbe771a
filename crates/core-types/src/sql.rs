//! Validated pieces of SQL text.
//!
//! Query values always travel as bound parameters. The only text that is ever
//! spliced into a statement is a [`SqlFragment`], and a fragment can only be
//! made from a compile-time literal, a validated [`Limit`], a validated
//! [`TableName`], or a `CASE` rendered from [`CodeLabel`] constants.

use crate::enums::{CodeLabel, DistanceBand};
use crate::error::ValidationError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A piece of SQL that is safe to splice into a statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlFragment(String);

impl SqlFragment {
    /// `CASE WHEN expr = 'code' THEN 'label' ... ELSE <fallback> END`.
    pub fn code_case<T: CodeLabel>(expr: &'static str) -> Self {
        let mut sql = String::from("CASE");
        for item in T::ALL {
            sql.push_str(&format!(
                " WHEN {expr} = '{}' THEN '{}'",
                item.code(),
                item.label()
            ));
        }
        match T::fallback() {
            Some(label) => sql.push_str(&format!(" ELSE '{label}' END")),
            None => sql.push_str(&format!(" ELSE {expr} END")),
        }
        Self(sql)
    }

    /// Maps a distance column (digit string) onto the distance band labels.
    pub fn distance_band_case(expr: &'static str) -> Self {
        Self(format!(
            "CASE WHEN CAST({expr} AS INTEGER) <= {} THEN '{}' WHEN CAST({expr} AS INTEGER) <= {} THEN '{}' ELSE '{}' END",
            DistanceBand::SHORT_MAX_METERS,
            DistanceBand::Short.label(),
            DistanceBand::MIDDLE_MAX_METERS,
            DistanceBand::Middle.label(),
            DistanceBand::Long.label(),
        ))
    }

    pub fn limit(limit: Limit) -> Self {
        Self(format!("LIMIT {}", limit.get()))
    }

    pub fn table(name: &TableName) -> Self {
        Self(format!("\"{}\"", name.as_str()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A positive row limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Limit(u32);

impl Limit {
    pub fn new(n: u32) -> Result<Self, ValidationError> {
        if n == 0 {
            return Err(ValidationError::InvalidLimit(n.to_string()));
        }
        Ok(Self(n))
    }

    /// Parses untrusted text. Anything but a positive integer is rejected.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ValidationError::InvalidLimit(raw.to_string()));
        }
        let n = trimmed
            .parse::<u32>()
            .map_err(|_| ValidationError::InvalidLimit(raw.to_string()))?;
        Self::new(n)
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

impl FromStr for Limit {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// A table name that passed identifier validation against the live schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableName(String);

impl TableName {
    /// Accepts `name` only if it is a plain lowercase identifier and one of
    /// the `known` tables returned by schema introspection.
    pub fn validate(name: &str, known: &[String]) -> Result<Self, ValidationError> {
        if !is_plain_identifier(name) {
            return Err(ValidationError::InvalidIdentifier(name.to_string()));
        }
        if !known.iter().any(|k| k == name) {
            return Err(ValidationError::UnknownTable(name.to_string()));
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `[a-z_][a-z0-9_]*`
pub fn is_plain_identifier(name: &str) -> bool {
    let mut bytes = name.bytes();
    match bytes.next() {
        Some(b) if b.is_ascii_lowercase() || b == b'_' => {}
        _ => return false,
    }
    bytes.all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
}

/// A four-digit meeting year (kaisai_nen).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Year(u16);

impl Year {
    pub fn new(year: u16) -> Result<Self, ValidationError> {
        if !(1000..=9999).contains(&year) {
            return Err(ValidationError::InvalidYear(year.to_string()));
        }
        Ok(Self(year))
    }

    pub fn get(&self) -> u16 {
        self.0
    }

    /// The column stores years as text, so parameters are bound as text.
    pub fn as_param(&self) -> String {
        self.0.to_string()
    }
}

impl FromStr for Year {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 4 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ValidationError::InvalidYear(s.to_string()));
        }
        let year = s
            .parse::<u16>()
            .map_err(|_| ValidationError::InvalidYear(s.to_string()))?;
        Self::new(year)
    }
}

impl fmt::Display for Year {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}", self.0)
    }
}

/// An inclusive span of meeting years.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct YearRange {
    start: Year,
    end: Year,
}

impl YearRange {
    pub fn new(start: Year, end: Year) -> Result<Self, ValidationError> {
        if start > end {
            return Err(ValidationError::InvalidYearRange {
                start: start.get(),
                end: end.get(),
            });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> Year {
        self.start
    }

    pub fn end(&self) -> Year {
        self.end
    }
}

/// A race day in YYYYMMDD form, split the way the source tables store it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RaceDate(NaiveDate);

impl RaceDate {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        if raw.len() != 8 || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ValidationError::InvalidRaceDate(raw.to_string()));
        }
        NaiveDate::parse_from_str(raw, "%Y%m%d")
            .map(Self)
            .map_err(|_| ValidationError::InvalidRaceDate(raw.to_string()))
    }

    /// kaisai_nen
    pub fn year(&self) -> String {
        self.0.format("%Y").to_string()
    }

    /// kaisai_tsukihi
    pub fn month_day(&self) -> String {
        self.0.format("%m%d").to_string()
    }
}

impl FromStr for RaceDate {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for RaceDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y%m%d"))
    }
}
