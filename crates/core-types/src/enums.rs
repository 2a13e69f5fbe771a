use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A closed set of source-table codes with a display label for each.
///
/// Implementors can be rendered into a SQL `CASE` expression with
/// [`crate::sql::SqlFragment::code_case`]; both codes and labels are
/// compile-time constants, so the rendered text never contains caller input.
pub trait CodeLabel: Sized + Copy + 'static {
    const ALL: &'static [Self];

    fn code(&self) -> &'static str;

    fn label(&self) -> &'static str;

    /// Label for codes outside `ALL`. `None` keeps the raw code.
    fn fallback() -> Option<&'static str> {
        None
    }

    fn from_code(code: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|v| v.code() == code)
    }
}

/// Racecourse (keibajo_code).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Venue {
    Sapporo,
    Hakodate,
    Fukushima,
    Niigata,
    Tokyo,
    Nakayama,
    Chukyo,
    Kyoto,
    Hanshin,
    Kokura,
}

impl CodeLabel for Venue {
    const ALL: &'static [Self] = &[
        Venue::Sapporo,
        Venue::Hakodate,
        Venue::Fukushima,
        Venue::Niigata,
        Venue::Tokyo,
        Venue::Nakayama,
        Venue::Chukyo,
        Venue::Kyoto,
        Venue::Hanshin,
        Venue::Kokura,
    ];

    fn code(&self) -> &'static str {
        match self {
            Venue::Sapporo => "01",
            Venue::Hakodate => "02",
            Venue::Fukushima => "03",
            Venue::Niigata => "04",
            Venue::Tokyo => "05",
            Venue::Nakayama => "06",
            Venue::Chukyo => "07",
            Venue::Kyoto => "08",
            Venue::Hanshin => "09",
            Venue::Kokura => "10",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Venue::Sapporo => "Sapporo",
            Venue::Hakodate => "Hakodate",
            Venue::Fukushima => "Fukushima",
            Venue::Niigata => "Niigata",
            Venue::Tokyo => "Tokyo",
            Venue::Nakayama => "Nakayama",
            Venue::Chukyo => "Chukyo",
            Venue::Kyoto => "Kyoto",
            Venue::Hanshin => "Hanshin",
            Venue::Kokura => "Kokura",
        }
    }
}

/// Track surface, taken from the first character of track_code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Surface {
    Turf,
    Dirt,
}

impl CodeLabel for Surface {
    const ALL: &'static [Self] = &[Surface::Turf, Surface::Dirt];

    fn code(&self) -> &'static str {
        match self {
            Surface::Turf => "1",
            Surface::Dirt => "2",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Surface::Turf => "turf",
            Surface::Dirt => "dirt",
        }
    }

    fn fallback() -> Option<&'static str> {
        Some("other")
    }
}

/// Going (babajotai_code), shared by the turf and dirt columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackCondition {
    Firm,
    Good,
    Yielding,
    Soft,
}

impl CodeLabel for TrackCondition {
    const ALL: &'static [Self] = &[
        TrackCondition::Firm,
        TrackCondition::Good,
        TrackCondition::Yielding,
        TrackCondition::Soft,
    ];

    fn code(&self) -> &'static str {
        match self {
            TrackCondition::Firm => "1",
            TrackCondition::Good => "2",
            TrackCondition::Yielding => "3",
            TrackCondition::Soft => "4",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            TrackCondition::Firm => "firm",
            TrackCondition::Good => "good",
            TrackCondition::Yielding => "yielding",
            TrackCondition::Soft => "soft",
        }
    }
}

/// Weather on race day (tenko_code).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Weather {
    Fine,
    Cloudy,
    LightRain,
    Rain,
    LightSnow,
    Snow,
}

impl CodeLabel for Weather {
    const ALL: &'static [Self] = &[
        Weather::Fine,
        Weather::Cloudy,
        Weather::LightRain,
        Weather::Rain,
        Weather::LightSnow,
        Weather::Snow,
    ];

    fn code(&self) -> &'static str {
        match self {
            Weather::Fine => "1",
            Weather::Cloudy => "2",
            Weather::LightRain => "3",
            Weather::Rain => "4",
            Weather::LightSnow => "5",
            Weather::Snow => "6",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Weather::Fine => "fine",
            Weather::Cloudy => "cloudy",
            Weather::LightRain => "light_rain",
            Weather::Rain => "rain",
            Weather::LightSnow => "light_snow",
            Weather::Snow => "snow",
        }
    }
}

/// Race distance band. Upper bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DistanceBand {
    Short,
    Middle,
    Long,
}

impl DistanceBand {
    pub const SHORT_MAX_METERS: u32 = 1400;
    pub const MIDDLE_MAX_METERS: u32 = 2000;

    pub fn from_meters(meters: u32) -> Self {
        if meters <= Self::SHORT_MAX_METERS {
            DistanceBand::Short
        } else if meters <= Self::MIDDLE_MAX_METERS {
            DistanceBand::Middle
        } else {
            DistanceBand::Long
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DistanceBand::Short => "short",
            DistanceBand::Middle => "middle",
            DistanceBand::Long => "long",
        }
    }
}

/// Letter grade assigned to a return on investment percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RoiRank {
    S,
    A,
    B,
    C,
    D,
}

impl RoiRank {
    /// Lower bounds (inclusive), highest grade first. Order matters.
    pub const THRESHOLDS: [(RoiRank, Decimal); 4] = [
        (RoiRank::S, Decimal::from_parts(200, 0, 0, false, 0)),
        (RoiRank::A, Decimal::from_parts(100, 0, 0, false, 0)),
        (RoiRank::B, Decimal::from_parts(70, 0, 0, false, 0)),
        (RoiRank::C, Decimal::from_parts(50, 0, 0, false, 0)),
    ];

    pub fn from_roi(roi: Decimal) -> Self {
        Self::THRESHOLDS
            .iter()
            .find(|(_, lower)| roi >= *lower)
            .map_or(RoiRank::D, |(rank, _)| *rank)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RoiRank::S => "S",
            RoiRank::A => "A",
            RoiRank::B => "B",
            RoiRank::C => "C",
            RoiRank::D => "D",
        }
    }
}

impl fmt::Display for RoiRank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Finishing-position codes meaning scratched and disqualified.
pub const FINISH_SENTINELS: [&str; 2] = ["00", "99"];

/// Parses a kakutei_chakujun value into a finishing place.
///
/// Only non-empty all-digit strings that are not a sentinel and denote a place
/// of at least 1 count as a finish.
pub fn parse_finish_position(raw: &str) -> Option<u32> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if FINISH_SENTINELS.contains(&raw) {
        return None;
    }
    raw.parse::<u32>().ok().filter(|p| *p >= 1)
}
