//! The fixed set of analytical statements.
//!
//! Every function here is pure: it validates its inputs and returns the
//! statement plus the parameters to bind. Nothing runs until the query is
//! handed to [`crate::AnalyticsLibrary`].

use cache::CacheKey;
use core_types::{
    Limit, Params, RaceDate, SqlFragment, Surface, TrackCondition, ValidationError, Venue, Weather,
    Year, YearRange,
};
use database::QueryTemplate;

/// Joins the entrant table `s` to its race `r`.
const RACE_JOIN: &str = "JOIN jvd_ra r ON s.kaisai_nen = r.kaisai_nen \
     AND s.kaisai_tsukihi = r.kaisai_tsukihi \
     AND s.keibajo_code = r.keibajo_code \
     AND s.race_bango = r.race_bango";

/// Keeps only entrants with a real finishing place (digits, not a sentinel, at least 1).
pub const FINISH_FILTER: &str = "s.kakutei_chakujun ~ '^[0-9]+$' \
     AND s.kakutei_chakujun NOT IN ('00', '99') \
     AND CASE WHEN s.kakutei_chakujun ~ '^[0-9]+$' THEN CAST(s.kakutei_chakujun AS INTEGER) ELSE 0 END >= 1";

/// Decoded win odds, or NULL when the stored odds are not plain digits ("----", blank).
pub const WIN_ODDS: &str = "CASE WHEN TRIM(s.tansho_odds) ~ '^[0-9]+$' \
     THEN CAST(TRIM(s.tansho_odds) AS NUMERIC) / 10 END";

/// Raw counts shared by every aggregate. Rates are derived from these in Rust.
/// A winner with unreadable odds pays 0, as in `AggregateCounts::record`.
const COUNT_COLUMNS: &str = "COUNT(*) AS total_races, \
     COUNT(*) FILTER (WHERE CAST(s.kakutei_chakujun AS INTEGER) = 1) AS wins, \
     COUNT(*) FILTER (WHERE CAST(s.kakutei_chakujun AS INTEGER) <= 3) AS top3, \
     COALESCE(SUM(CASE WHEN CAST(s.kakutei_chakujun AS INTEGER) = 1 \
         THEN CASE WHEN TRIM(s.tansho_odds) ~ '^[0-9]+$' \
         THEN CAST(TRIM(s.tansho_odds) AS NUMERIC) / 10 ELSE 0 END \
         ELSE 0 END), 0) AS payout_sum, \
     ROUND(AVG(CASE WHEN TRIM(s.tansho_odds) ~ '^[0-9]+$' \
         THEN CAST(TRIM(s.tansho_odds) AS NUMERIC) / 10 END) \
         FILTER (WHERE CAST(s.kakutei_chakujun AS INTEGER) = 1), 2) AS avg_win_odds";

/// Going of race `r`, read from the turf or dirt column depending on the surface.
const RACE_GOING: &str = "CASE WHEN SUBSTRING(r.track_code, 1, 1) = '1' \
     THEN r.babajotai_code_shiba ELSE r.babajotai_code_dirt END";

const YEAR_FILTER: &str = "WHERE kaisai_nen BETWEEN :start_year AND :end_year";

const YEAR_TOTAL: &str = "ROUND(COUNT(*) * 100.0 / (SELECT COUNT(*) FROM jvd_ra \
     WHERE kaisai_nen BETWEEN :start_year AND :end_year), 2) AS percentage";

pub const RACE_BASE: &str = "race_base";
pub const RACE_ENTRIES: &str = "race_entries";
pub const HORSE_HISTORY: &str = "horse_history";
pub const JOCKEY_COURSE_STATS: &str = "jockey_course_stats";
pub const SIRE_CONDITION_STATS: &str = "sire_condition_stats";

/// A statement ready to run, with the name it is cached under.
#[derive(Debug, Clone)]
pub struct AnalysisQuery {
    pub name: &'static str,
    pub template: QueryTemplate,
    pub params: Params,
    /// Whether the result carries raw counts to turn into rates and a grade.
    pub derive_rates: bool,
}

impl AnalysisQuery {
    fn new(name: &'static str, template: QueryTemplate, params: Params) -> Self {
        Self {
            name,
            template,
            params,
            derive_rates: false,
        }
    }

    fn with_rates(mut self) -> Self {
        self.derive_rates = true;
        self
    }

    /// The key covers the name, the final statement text and every bound value.
    pub fn cache_key(&self) -> Result<CacheKey, ValidationError> {
        CacheKey::derive(self.name, self.template.sql(), &self.params)
    }
}

fn year_params(range: YearRange) -> Params {
    Params::new()
        .with("start_year", range.start().as_param())
        .with("end_year", range.end().as_param())
}

/// Registration numbers and agent codes are plain ASCII alphanumerics.
fn require_code(field: &str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return Err(ValidationError::InvalidInput(
            field.to_string(),
            value.to_string(),
        ));
    }
    Ok(trimmed.to_string())
}

/// One row per race, with the going taken from the surface the race ran on.
pub fn race_base(range: YearRange, limit: Option<Limit>) -> AnalysisQuery {
    let template = QueryTemplate::builder()
        .push(
            "SELECT kaisai_nen, kaisai_tsukihi, keibajo_code, race_bango, kyori, track_code, tenko_code, \
             CASE WHEN SUBSTRING(track_code, 1, 1) = '1' THEN babajotai_code_shiba \
             ELSE babajotai_code_dirt END AS baba_jotai, \
             shusso_tosu \
             FROM jvd_ra",
        )
        .push(YEAR_FILTER)
        .push("ORDER BY kaisai_nen, kaisai_tsukihi, keibajo_code, race_bango")
        .limit(limit)
        .build();
    AnalysisQuery::new(RACE_BASE, template, year_params(range))
}

/// Races joined with their entrants and each entrant's sire and dam.
pub fn race_entries(range: YearRange, limit: Option<Limit>) -> AnalysisQuery {
    let template = QueryTemplate::builder()
        .push(
            "SELECT r.kaisai_nen, r.kaisai_tsukihi, r.keibajo_code, r.race_bango, \
             r.kyori, r.track_code, r.tenko_code,",
        )
        .push(RACE_GOING)
        .push(
            "AS baba_jotai, r.shusso_tosu, \
             s.ketto_toroku_bango, TRIM(s.bamei) AS bamei, s.wakuban, s.umaban, \
             s.kishu_code, TRIM(s.kishumei_ryakusho) AS kishumei_ryakusho, \
             s.chokyoshi_code, TRIM(s.chokyoshimei_ryakusho) AS chokyoshimei_ryakusho, \
             s.barei, s.seibetsu_code, s.bataiju, s.zogen_fugo, s.zogen_sa, \
             s.blinker_shiyo_kubun, s.kakutei_chakujun, s.soha_time, s.kohan_3f, \
             s.tansho_odds, s.tansho_ninkijun, \
             u.seinengappi, \
             u.ketto_joho_01a AS sire_id, TRIM(u.ketto_joho_01b) AS sire_name, \
             u.ketto_joho_02a AS dam_id, TRIM(u.ketto_joho_02b) AS dam_name \
             FROM jvd_ra r \
             JOIN jvd_se s ON r.kaisai_nen = s.kaisai_nen \
             AND r.kaisai_tsukihi = s.kaisai_tsukihi \
             AND r.keibajo_code = s.keibajo_code \
             AND r.race_bango = s.race_bango \
             LEFT JOIN jvd_um u ON s.ketto_toroku_bango = u.ketto_toroku_bango \
             WHERE r.kaisai_nen BETWEEN :start_year AND :end_year \
             ORDER BY r.kaisai_nen, r.kaisai_tsukihi, r.keibajo_code, r.race_bango, s.wakuban",
        )
        .limit(limit)
        .build();
    AnalysisQuery::new(RACE_ENTRIES, template, year_params(range))
}

/// Valid past finishes of one horse, oldest first, optionally up to and
/// including `before`.
pub fn horse_history(horse_id: &str, before: Option<RaceDate>) -> Result<AnalysisQuery, ValidationError> {
    let horse_id = require_code("horse_id", horse_id)?;
    let template = QueryTemplate::builder()
        .push(
            "SELECT s.kaisai_nen || s.kaisai_tsukihi AS race_date, \
             s.keibajo_code, s.race_bango, r.kyori, r.track_code,",
        )
        .push(RACE_GOING)
        .push(
            "AS baba_jotai, s.kishu_code, s.chokyoshi_code, \
             s.bataiju, s.zogen_fugo, s.zogen_sa, \
             CAST(s.kakutei_chakujun AS INTEGER) AS finish_position, \
             CAST(NULLIF(TRIM(s.soha_time), '') AS INTEGER) AS time, \
             CAST(NULLIF(TRIM(s.kohan_3f), '') AS INTEGER) AS last_3f, \
             CAST(NULLIF(TRIM(s.tansho_ninkijun), '') AS INTEGER) AS popularity,",
        )
        .push(WIN_ODDS)
        .push("AS odds FROM jvd_se s")
        .push(RACE_JOIN)
        .push("WHERE s.ketto_toroku_bango = :horse_id AND")
        .push(FINISH_FILTER)
        .push_if(
            before.is_some(),
            "AND (s.kaisai_nen < :year OR (s.kaisai_nen = :year AND s.kaisai_tsukihi <= :date))",
        )
        .push("ORDER BY s.kaisai_nen, s.kaisai_tsukihi")
        .build();

    let mut params = Params::new().with("horse_id", horse_id);
    if let Some(date) = before {
        params.insert("year", date.year());
        params.insert("date", date.month_day());
    }
    Ok(AnalysisQuery::new(HORSE_HISTORY, template, params))
}

/// Per venue, surface and distance band results of one jockey over the
/// `years_range` years before `reference_year`.
///
/// The lookback start is resolved here, so the same call made in a later year
/// is a different cache entry rather than a stale hit.
pub fn jockey_course_stats(
    jockey_code: &str,
    years_range: u16,
    min_races: u32,
    reference_year: Year,
) -> Result<AnalysisQuery, ValidationError> {
    let jockey_code = require_code("jockey_code", jockey_code)?;
    let from_year = Year::new(reference_year.get().saturating_sub(years_range))?;

    let template = QueryTemplate::builder()
        .push(
            "WITH jockey_courses AS (SELECT s.kishu_code, r.keibajo_code, \
             SUBSTRING(r.track_code, 1, 1) AS track_type,",
        )
        .push_fragment(SqlFragment::distance_band_case("r.kyori"))
        .push("AS distance_band,")
        .push(COUNT_COLUMNS)
        .push("FROM jvd_se s")
        .push(RACE_JOIN)
        .push("WHERE s.kishu_code = :jockey_code AND s.kaisai_nen >= :from_year AND")
        .push(FINISH_FILTER)
        .push(
            "GROUP BY s.kishu_code, r.keibajo_code, track_type, distance_band \
             HAVING COUNT(*) >= :min_races) \
             SELECT kishu_code, keibajo_code,",
        )
        .push_fragment(SqlFragment::code_case::<Venue>("keibajo_code"))
        .push("AS venue_name, track_type,")
        .push_fragment(SqlFragment::code_case::<Surface>("track_type"))
        .push(
            "AS surface, distance_band, total_races, wins, top3, avg_win_odds, payout_sum \
             FROM jockey_courses \
             ORDER BY payout_sum / total_races DESC, keibajo_code, track_type, distance_band",
        )
        .build();

    let params = Params::new()
        .with("jockey_code", jockey_code)
        .with("from_year", from_year.as_param())
        .with("min_races", i64::from(min_races));
    Ok(AnalysisQuery::new(JOCKEY_COURSE_STATS, template, params).with_rates())
}

/// Per sire, surface and going results of the sire's offspring. With
/// `sire_id = None` every sire is included.
pub fn sire_condition_stats(
    sire_id: Option<&str>,
    min_horses: u32,
    min_races: u32,
) -> Result<AnalysisQuery, ValidationError> {
    let sire_id = sire_id.map(|id| require_code("sire_id", id)).transpose()?;

    let template = QueryTemplate::builder()
        .push(
            "WITH sire_conditions AS (SELECT u.ketto_joho_01a AS sire_id, \
             TRIM(u.ketto_joho_01b) AS sire_name, \
             SUBSTRING(r.track_code, 1, 1) AS track_type,",
        )
        .push(RACE_GOING)
        .push("AS track_condition, COUNT(DISTINCT s.ketto_toroku_bango) AS horses_count,")
        .push(COUNT_COLUMNS)
        .push(
            ", ROUND(AVG(CAST(NULLIF(TRIM(s.tansho_ninkijun), '') AS INTEGER)), 2) AS avg_popularity \
             FROM jvd_se s",
        )
        .push(RACE_JOIN)
        .push("JOIN jvd_um u ON s.ketto_toroku_bango = u.ketto_toroku_bango WHERE")
        .push(FINISH_FILTER)
        .push_if(sire_id.is_some(), "AND u.ketto_joho_01a = :sire_id")
        .push(
            "GROUP BY u.ketto_joho_01a, sire_name, track_type, track_condition \
             HAVING COUNT(DISTINCT s.ketto_toroku_bango) >= :min_horses AND COUNT(*) >= :min_races) \
             SELECT sire_id, sire_name, track_type,",
        )
        .push_fragment(SqlFragment::code_case::<Surface>("track_type"))
        .push("AS surface, track_condition,")
        .push_fragment(SqlFragment::code_case::<TrackCondition>("track_condition"))
        .push(
            "AS track_condition_name, horses_count, total_races, wins, top3, \
             avg_popularity, avg_win_odds, payout_sum \
             FROM sire_conditions \
             ORDER BY payout_sum / total_races DESC, sire_id, track_type, track_condition",
        )
        .build();

    let mut params = Params::new()
        .with("min_horses", i64::from(min_horses))
        .with("min_races", i64::from(min_races));
    if let Some(id) = sire_id {
        params.insert("sire_id", id);
    }
    Ok(AnalysisQuery::new(SIRE_CONDITION_STATS, template, params).with_rates())
}

/// Descriptive race counts over a span of years.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Distribution {
    YearlyRaceCount,
    VenueRaceCount,
    TrackCondition,
    DistanceBand,
    Weather,
    MonthlyRaceCount,
    FieldSize,
}

impl Distribution {
    pub const ALL: [Distribution; 7] = [
        Distribution::YearlyRaceCount,
        Distribution::VenueRaceCount,
        Distribution::TrackCondition,
        Distribution::DistanceBand,
        Distribution::Weather,
        Distribution::MonthlyRaceCount,
        Distribution::FieldSize,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Distribution::YearlyRaceCount => "yearly_race_count",
            Distribution::VenueRaceCount => "venue_race_count",
            Distribution::TrackCondition => "track_condition_distribution",
            Distribution::DistanceBand => "distance_band_distribution",
            Distribution::Weather => "weather_distribution",
            Distribution::MonthlyRaceCount => "monthly_race_count",
            Distribution::FieldSize => "field_size_distribution",
        }
    }

    pub fn query(&self, range: YearRange) -> AnalysisQuery {
        let template = match self {
            Distribution::YearlyRaceCount => QueryTemplate::builder()
                .push("SELECT kaisai_nen AS year, COUNT(*) AS race_count FROM jvd_ra")
                .push(YEAR_FILTER)
                .push("GROUP BY kaisai_nen ORDER BY kaisai_nen"),
            Distribution::VenueRaceCount => QueryTemplate::builder()
                .push("SELECT keibajo_code,")
                .push_fragment(SqlFragment::code_case::<Venue>("keibajo_code"))
                .push("AS venue_name, COUNT(*) AS race_count FROM jvd_ra")
                .push(YEAR_FILTER)
                .push("GROUP BY keibajo_code ORDER BY keibajo_code"),
            Distribution::TrackCondition => QueryTemplate::builder()
                .push("SELECT track_type,")
                .push_fragment(SqlFragment::code_case::<Surface>("track_type"))
                .push("AS surface, track_condition,")
                .push_fragment(SqlFragment::code_case::<TrackCondition>("track_condition"))
                .push("AS condition_name, COUNT(*) AS race_count,")
                .push(YEAR_TOTAL)
                .push(
                    "FROM (SELECT SUBSTRING(track_code, 1, 1) AS track_type, \
                     CASE WHEN SUBSTRING(track_code, 1, 1) = '1' THEN babajotai_code_shiba \
                     ELSE babajotai_code_dirt END AS track_condition \
                     FROM jvd_ra",
                )
                .push(YEAR_FILTER)
                .push(") races GROUP BY track_type, track_condition ORDER BY track_type, track_condition"),
            Distribution::DistanceBand => QueryTemplate::builder()
                .push("SELECT")
                .push_fragment(SqlFragment::distance_band_case("kyori"))
                .push("AS distance_band, SUBSTRING(track_code, 1, 1) AS track_type,")
                .push_fragment(SqlFragment::code_case::<Surface>("SUBSTRING(track_code, 1, 1)"))
                .push("AS surface, COUNT(*) AS race_count FROM jvd_ra")
                .push(YEAR_FILTER)
                .push("GROUP BY distance_band, track_type, surface ORDER BY distance_band, track_type"),
            Distribution::Weather => QueryTemplate::builder()
                .push("SELECT tenko_code,")
                .push_fragment(SqlFragment::code_case::<Weather>("tenko_code"))
                .push("AS weather_name, COUNT(*) AS race_count,")
                .push(YEAR_TOTAL)
                .push("FROM jvd_ra")
                .push(YEAR_FILTER)
                .push("GROUP BY tenko_code ORDER BY race_count DESC, tenko_code"),
            Distribution::MonthlyRaceCount => QueryTemplate::builder()
                .push("SELECT SUBSTRING(kaisai_tsukihi, 1, 2) AS month, COUNT(*) AS race_count FROM jvd_ra")
                .push(YEAR_FILTER)
                .push("GROUP BY month ORDER BY month"),
            Distribution::FieldSize => QueryTemplate::builder()
                .push("SELECT shusso_tosu AS field_size, COUNT(*) AS race_count,")
                .push(YEAR_TOTAL)
                .push("FROM jvd_ra")
                .push(YEAR_FILTER)
                .push("GROUP BY shusso_tosu ORDER BY shusso_tosu"),
        };
        AnalysisQuery::new(self.name(), template.build(), year_params(range))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::Value;

    fn range(start: u16, end: u16) -> YearRange {
        YearRange::new(Year::new(start).unwrap(), Year::new(end).unwrap()).unwrap()
    }

    fn assert_binds(query: &AnalysisQuery) {
        if let Err(e) = query.template.bind(&query.params) {
            panic!("{} does not bind: {e}", query.name);
        }
    }

    #[test]
    fn every_catalog_entry_binds_its_own_parameters() {
        let year = Year::new(2024).unwrap();
        let date = RaceDate::parse("20230528").unwrap();
        let mut queries = vec![
            race_base(range(2020, 2024), None),
            race_base(range(2020, 2024), Some(Limit::new(5).unwrap())),
            race_entries(range(2020, 2024), Some(Limit::new(5).unwrap())),
            horse_history("2019104567", None).unwrap(),
            horse_history("2019104567", Some(date)).unwrap(),
            jockey_course_stats("01126", 5, 3, year).unwrap(),
            sire_condition_stats(None, 3, 10).unwrap(),
            sire_condition_stats(Some("1120000123"), 3, 10).unwrap(),
        ];
        queries.extend(Distribution::ALL.iter().map(|d| d.query(range(2020, 2024))));
        for query in &queries {
            assert_binds(query);
            assert!(query.cache_key().is_ok(), "{}", query.name);
        }
    }

    #[test]
    fn limit_is_spliced_as_validated_text() {
        let query = race_base(range(2020, 2024), Some(Limit::parse("5").unwrap()));
        assert!(query.template.sql().ends_with("LIMIT 5"));
        assert!(!race_base(range(2020, 2024), None).template.sql().contains("LIMIT"));
        assert_eq!(query.params.get("start_year"), Some(&Value::from("2020")));
    }

    #[test]
    fn aggregates_filter_finishing_positions() {
        let year = Year::new(2024).unwrap();
        let jockey = jockey_course_stats("01126", 5, 3, year).unwrap();
        let sire = sire_condition_stats(None, 3, 10).unwrap();
        for query in [&jockey, &sire] {
            assert!(query.derive_rates);
            assert!(query.template.sql().contains(FINISH_FILTER));
            assert!(query.template.sql().contains("payout_sum / total_races DESC"));
            // Odds are cast only after the digit check.
            assert!(!query.template.sql().contains("CAST(s.tansho_odds"));
            assert!(query.template.sql().contains("TRIM(s.tansho_odds) ~ '^[0-9]+$'"));
        }
        let history = horse_history("2020104567", None).unwrap();
        assert!(history.template.sql().contains(WIN_ODDS));
    }

    #[test]
    fn jockey_window_is_resolved_from_the_reference_year() {
        let query = jockey_course_stats("01126", 5, 3, Year::new(2024).unwrap()).unwrap();
        assert_eq!(query.params.get("from_year"), Some(&Value::from("2019")));
        assert_eq!(query.params.get("min_races"), Some(&Value::Int(3)));

        let later = jockey_course_stats("01126", 5, 3, Year::new(2025).unwrap()).unwrap();
        assert_ne!(query.cache_key().unwrap(), later.cache_key().unwrap());
    }

    #[test]
    fn sire_filter_is_optional() {
        let all = sire_condition_stats(None, 3, 10).unwrap();
        let one = sire_condition_stats(Some("1120000123"), 3, 10).unwrap();
        assert!(!all.template.sql().contains(":sire_id"));
        assert!(one.template.sql().contains(":sire_id"));
        assert!(!all.params.contains("sire_id"));
        assert_ne!(all.cache_key().unwrap(), one.cache_key().unwrap());
    }

    #[test]
    fn sire_thresholds_are_part_of_the_key() {
        let base = sire_condition_stats(None, 3, 10).unwrap().cache_key().unwrap();
        let horses = sire_condition_stats(None, 5, 10).unwrap().cache_key().unwrap();
        let races = sire_condition_stats(None, 3, 20).unwrap().cache_key().unwrap();
        assert_ne!(base, horses);
        assert_ne!(base, races);
        assert_ne!(horses, races);
    }

    #[test]
    fn horse_history_date_filter() {
        let date = RaceDate::parse("20230528").unwrap();
        let query = horse_history("2019104567", Some(date)).unwrap();
        assert_eq!(query.params.get("year"), Some(&Value::from("2023")));
        assert_eq!(query.params.get("date"), Some(&Value::from("0528")));
        assert!(horse_history("", None).is_err());
        assert!(horse_history("2019'; DROP", None).is_err());
    }

    #[test]
    fn distributions_have_distinct_names() {
        let mut names: Vec<&str> = Distribution::ALL.iter().map(|d| d.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), Distribution::ALL.len());
    }

    #[test]
    fn labels_come_from_the_code_enums() {
        let sql = Distribution::VenueRaceCount.query(range(2020, 2024)).template;
        assert!(sql.sql().contains("WHEN keibajo_code = '05' THEN 'Tokyo'"));
        let sql = Distribution::Weather.query(range(2020, 2024)).template;
        assert!(sql.sql().contains("THEN 'light_rain'"));
    }
}
