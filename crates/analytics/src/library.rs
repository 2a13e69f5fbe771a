use crate::catalog::{self, AnalysisQuery, Distribution};
use crate::error::AnalyticsError;
use crate::metrics::derive_rate_columns;
use crate::report::{DatabaseReport, database_report};
use cache::CacheStore;
use chrono::Datelike;
use core_types::{Limit, RaceDate, ResultTable, Year, YearRange};
use database::QueryExecutor;
use tracing::{debug, instrument};

/// Runs catalog queries through the cache.
///
/// Each result is stored under a key derived from the query's name, statement
/// and parameters, so a repeated call with the same arguments reads the cached
/// table instead of querying the database again. `force_refresh` skips the
/// lookup and overwrites the entry.
pub struct AnalyticsLibrary<E: QueryExecutor> {
    executor: E,
    cache: CacheStore,
    force_refresh: bool,
}

impl<E: QueryExecutor> AnalyticsLibrary<E> {
    pub fn new(executor: E, cache: CacheStore) -> Self {
        Self {
            executor,
            cache,
            force_refresh: false,
        }
    }

    pub fn with_force_refresh(mut self, force_refresh: bool) -> Self {
        self.force_refresh = force_refresh;
        self
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    pub fn force_refresh(&self) -> bool {
        self.force_refresh
    }

    /// Runs `query`, or returns its cached result.
    #[instrument(skip(self, query), fields(analysis = query.name))]
    pub fn run(&self, query: &AnalysisQuery) -> Result<ResultTable, AnalyticsError> {
        let key = query.cache_key()?;
        self.cache.get_or_compute(&key, self.force_refresh, || -> Result<ResultTable, AnalyticsError> {
            let mut table = self.executor.execute(&query.template, &query.params)?;
            if query.derive_rates {
                derive_rate_columns(&mut table)?;
            }
            debug!(rows = table.len(), "Query finished");
            Ok(table)
        })
    }

    pub fn race_base(
        &self,
        range: YearRange,
        limit: Option<Limit>,
    ) -> Result<ResultTable, AnalyticsError> {
        self.run(&catalog::race_base(range, limit))
    }

    pub fn race_entries(
        &self,
        range: YearRange,
        limit: Option<Limit>,
    ) -> Result<ResultTable, AnalyticsError> {
        self.run(&catalog::race_entries(range, limit))
    }

    pub fn horse_history(
        &self,
        horse_id: &str,
        before: Option<RaceDate>,
    ) -> Result<ResultTable, AnalyticsError> {
        self.run(&catalog::horse_history(horse_id, before)?)
    }

    /// `reference_year` defaults to the current calendar year.
    pub fn jockey_course_stats(
        &self,
        jockey_code: &str,
        years_range: u16,
        min_races: u32,
        reference_year: Option<Year>,
    ) -> Result<ResultTable, AnalyticsError> {
        let reference_year = match reference_year {
            Some(year) => year,
            None => current_year()?,
        };
        self.run(&catalog::jockey_course_stats(
            jockey_code,
            years_range,
            min_races,
            reference_year,
        )?)
    }

    pub fn sire_condition_stats(
        &self,
        sire_id: Option<&str>,
        min_horses: u32,
        min_races: u32,
    ) -> Result<ResultTable, AnalyticsError> {
        self.run(&catalog::sire_condition_stats(sire_id, min_horses, min_races)?)
    }

    pub fn distribution(&self, kind: Distribution, range: YearRange) -> Result<ResultTable, AnalyticsError> {
        self.run(&kind.query(range))
    }

    /// Not cached: the report is cheap and meant to reflect the live schema.
    pub fn database_report(&self, sample_limit: Limit) -> Result<DatabaseReport, AnalyticsError> {
        database_report(&self.executor, sample_limit)
    }
}

fn current_year() -> Result<Year, AnalyticsError> {
    let year = u16::try_from(chrono::Local::now().year()).unwrap_or(0);
    Ok(Year::new(year)?)
}
