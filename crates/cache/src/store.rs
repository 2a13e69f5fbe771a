use crate::error::CacheError;
use crate::key::CacheKey;
use chrono::{DateTime, Utc};
use core_types::{ResultTable, Value};
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::{debug, info};

/// File extension of cache entries.
pub const CACHE_EXTENSION: &str = "json";

fn check_finite(key: &CacheKey, table: &ResultTable) -> Result<(), CacheError> {
    for (row, values) in table.iter().enumerate() {
        let bad = values
            .values()
            .iter()
            .position(|v| matches!(v, Value::Float(f) if !f.is_finite()));
        if let Some(index) = bad {
            return Err(CacheError::NonFiniteFloat {
                key: key.to_string(),
                column: table.columns()[index].clone(),
                row,
            });
        }
    }
    Ok(())
}

/// Summary of one cache file, for listing.
#[derive(Debug, Clone, Serialize)]
pub struct CacheEntryInfo {
    pub key: String,
    pub analysis: String,
    pub size_bytes: u64,
    pub modified: Option<DateTime<Utc>>,
}

/// A directory of cached query results, one `{key}.json` file per entry.
///
/// Entries never expire; they are replaced only by a forced refresh or an
/// explicit [`CacheStore::invalidate`]. There is no locking: two processes
/// computing the same key both write, and the last rename wins.
#[derive(Debug, Clone)]
pub struct CacheStore {
    dir: PathBuf,
}

impl CacheStore {
    /// The directory is created lazily on the first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(format!("{}.{CACHE_EXTENSION}", key.as_str()))
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.path_for(key).is_file()
    }

    /// Returns the stored table, or `None` if there is no entry.
    ///
    /// An entry that exists but does not decode into a well-formed table is an
    /// error, not a miss.
    pub fn get(&self, key: &CacheKey) -> Result<Option<ResultTable>, CacheError> {
        let path = self.path_for(key);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(CacheError::Io { path, source }),
        };

        let table: ResultTable =
            serde_json::from_slice(&bytes).map_err(|e| CacheError::Deserialization {
                key: key.to_string(),
                reason: e.to_string(),
            })?;
        table.validate().map_err(|e| CacheError::Deserialization {
            key: key.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Some(table))
    }

    /// Stores `table` under `key`, replacing any existing entry.
    ///
    /// The data is written to a sibling temporary file and renamed into place.
    /// Tables holding NaN or infinite floats are refused, since they would not
    /// read back unchanged.
    pub fn put(&self, key: &CacheKey, table: &ResultTable) -> Result<(), CacheError> {
        check_finite(key, table)?;
        fs::create_dir_all(&self.dir).map_err(|source| CacheError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let bytes = serde_json::to_vec(table).map_err(|source| CacheError::Serialization {
            key: key.to_string(),
            source,
        })?;

        let path = self.path_for(key);
        let tmp = path.with_extension(format!("{CACHE_EXTENSION}.tmp"));
        fs::write(&tmp, &bytes).map_err(|source| CacheError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &path).map_err(|source| CacheError::Io {
            path: path.clone(),
            source,
        })?;

        debug!(key = %key, rows = table.len(), bytes = bytes.len(), "Wrote cache entry");
        Ok(())
    }

    /// Returns the cached table for `key`, computing and storing it on a miss.
    ///
    /// With `force_refresh` the existing entry is ignored and overwritten.
    /// `compute` runs at most once; if it fails, nothing is written.
    pub fn get_or_compute<F, E>(
        &self,
        key: &CacheKey,
        force_refresh: bool,
        compute: F,
    ) -> Result<ResultTable, E>
    where
        F: FnOnce() -> Result<ResultTable, E>,
        E: From<CacheError>,
    {
        if !force_refresh {
            if let Some(table) = self.get(key)? {
                info!(key = %key, rows = table.len(), "Loading from cache");
                return Ok(table);
            }
        }

        info!(key = %key, force_refresh, "Fetching from database");
        let table = compute()?;
        self.put(key, &table)?;
        Ok(table)
    }

    /// Deletes the entry for `key`. Returns whether one existed.
    pub fn invalidate(&self, key: &CacheKey) -> Result<bool, CacheError> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(source) => Err(CacheError::Io { path, source }),
        }
    }

    /// Lists the entries in the cache directory, sorted by key.
    ///
    /// Files that do not look like cache entries are skipped.
    pub fn entries(&self) -> Result<Vec<CacheEntryInfo>, CacheError> {
        let read_dir = match fs::read_dir(&self.dir) {
            Ok(rd) => rd,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(CacheError::Io {
                    path: self.dir.clone(),
                    source,
                });
            }
        };

        let mut entries = Vec::new();
        for entry in read_dir {
            let entry = entry.map_err(|source| CacheError::Io {
                path: self.dir.clone(),
                source,
            })?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(CACHE_EXTENSION) {
                continue;
            }
            let Some(key) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(CacheKey::from_file_stem)
            else {
                continue;
            };
            let metadata = entry.metadata().map_err(|source| CacheError::Io {
                path: path.clone(),
                source,
            })?;
            entries.push(CacheEntryInfo {
                analysis: key.analysis().to_string(),
                key: key.to_string(),
                size_bytes: metadata.len(),
                modified: metadata.modified().ok().map(DateTime::<Utc>::from),
            });
        }
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::{Params, Value};
    use std::cell::Cell;

    fn key(name: &str) -> CacheKey {
        CacheKey::named(name, &Params::new().with("start_year", "2020")).unwrap()
    }

    fn table(count: i64) -> ResultTable {
        ResultTable::from_rows(
            ["year", "race_count"],
            vec![vec![Value::from("2020"), Value::Int(count)]],
        )
        .unwrap()
    }

    #[test]
    fn missing_entry_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        assert!(store.get(&key("yearly_race_count")).unwrap().is_none());
    }

    #[test]
    fn put_creates_the_directory_and_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path().join("nested").join("cache"));
        let k = key("yearly_race_count");
        store.put(&k, &table(3456)).unwrap();
        assert!(store.contains(&k));
        assert_eq!(store.get(&k).unwrap(), Some(table(3456)));

        store.put(&k, &table(1)).unwrap();
        assert_eq!(store.get(&k).unwrap(), Some(table(1)));
    }

    #[test]
    fn decimals_survive_the_round_trip_exactly() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        let k = key("jockey_course_stats");
        let t = ResultTable::from_rows(
            ["roi", "note"],
            vec![vec![
                Value::Decimal(rust_decimal::Decimal::new(8000, 2)),
                Value::Null,
            ]],
        )
        .unwrap();
        store.put(&k, &t).unwrap();
        assert_eq!(store.get(&k).unwrap(), Some(t));
    }

    #[test]
    fn non_finite_floats_are_refused_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        let k = key("odds");
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let t = ResultTable::from_rows(
                ["entrant_id", "implied_probability"],
                vec![
                    vec![Value::from("a"), Value::Float(0.25)],
                    vec![Value::from("b"), Value::Float(bad)],
                ],
            )
            .unwrap();
            assert!(matches!(
                store.put(&k, &t),
                Err(CacheError::NonFiniteFloat { ref column, row: 1, .. }) if column == "implied_probability"
            ));
            assert!(!store.contains(&k));
        }

        // A failed put inside get_or_compute leaves no entry, so the next call computes again.
        let calls = Cell::new(0);
        for _ in 0..2 {
            let result = store.get_or_compute(&k, false, || {
                calls.set(calls.get() + 1);
                Ok::<_, CacheError>(
                    ResultTable::from_rows(["x"], vec![vec![Value::Float(f64::NAN)]]).unwrap(),
                )
            });
            assert!(matches!(result, Err(CacheError::NonFiniteFloat { .. })));
        }
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn compute_runs_once_per_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        let k = key("monthly_race_count");
        let calls = Cell::new(0);
        let compute = || {
            calls.set(calls.get() + 1);
            Ok::<_, CacheError>(table(12))
        };

        let first = store.get_or_compute(&k, false, compute).unwrap();
        let second = store.get_or_compute(&k, false, compute).unwrap();
        assert_eq!(first, second);
        assert_eq!(calls.get(), 1);

        let other = key("weather_distribution");
        store.get_or_compute(&other, false, compute).unwrap();
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn force_refresh_recomputes_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        let k = key("field_size_distribution");
        store.put(&k, &table(1)).unwrap();

        let refreshed = store
            .get_or_compute(&k, true, || Ok::<_, CacheError>(table(2)))
            .unwrap();
        assert_eq!(refreshed, table(2));
        assert_eq!(store.get(&k).unwrap(), Some(table(2)));
    }

    #[test]
    fn failed_compute_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        let k = key("venue_race_count");
        let result = store.get_or_compute(&k, false, || {
            Err::<ResultTable, _>(CacheError::Deserialization {
                key: "x".to_string(),
                reason: "boom".to_string(),
            })
        });
        assert!(result.is_err());
        assert!(!store.contains(&k));
    }

    #[test]
    fn corrupt_entries_are_errors_not_misses() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        let k = key("distance_band_distribution");
        fs::write(store.path_for(&k), b"{ not json").unwrap();

        assert!(matches!(store.get(&k), Err(CacheError::Deserialization { .. })));
        let calls = Cell::new(0);
        let result = store.get_or_compute(&k, false, || {
            calls.set(calls.get() + 1);
            Ok::<_, CacheError>(table(1))
        });
        assert!(matches!(result, Err(CacheError::Deserialization { .. })));
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn ragged_entries_are_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        let k = key("track_condition_distribution");
        fs::write(
            store.path_for(&k),
            br#"{"columns":["a","b"],"rows":[[{"type":"int","value":1}]]}"#,
        )
        .unwrap();
        assert!(matches!(store.get(&k), Err(CacheError::Deserialization { .. })));
    }

    #[test]
    fn invalidate_and_list() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        assert!(store.entries().unwrap().is_empty());

        let a = key("yearly_race_count");
        let b = key("monthly_race_count");
        store.put(&a, &table(1)).unwrap();
        store.put(&b, &table(2)).unwrap();
        fs::write(dir.path().join("README.txt"), b"not a cache entry").unwrap();

        let listed = store.entries().unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].analysis, "monthly_race_count");

        assert!(store.invalidate(&a).unwrap());
        assert!(!store.invalidate(&a).unwrap());
        assert_eq!(store.entries().unwrap().len(), 1);
    }
}
