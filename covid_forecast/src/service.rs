//! Forecast retrieval: serve year windows from the cache, regenerating on a miss

use crate::cache::{ForecastCache, ForecastRecord};
use crate::config::ForecastConfig;
use crate::data::TimeSeriesStore;
use crate::engine::{forecast_column, ForecastEngine, ForecastSeries};
use crate::error::{ForecastError, Result};
use crate::utils::{format_date, year_window, GLOBAL_KEY};
use chrono::NaiveDate;
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

/// Where a window's rows came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastSource {
    /// Read from a stored artifact
    Cache,
    /// Produced by a fresh model fit during this request
    Regenerated,
}

/// One forecast day across every variable
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForecastRow {
    #[serde(serialize_with = "serialize_date")]
    pub date: NaiveDate,
    /// Forecast value keyed by variable name
    pub values: BTreeMap<String, i64>,
}

impl ForecastRow {
    /// Forecast of one variable on this day
    pub fn value(&self, variable: &str) -> Option<i64> {
        self.values.get(variable).copied()
    }

    /// Values keyed by their `<variable>_forecast` column name
    pub fn columns(&self) -> BTreeMap<String, i64> {
        self.values
            .iter()
            .map(|(variable, value)| (forecast_column(variable), *value))
            .collect()
    }
}

fn serialize_date<S: Serializer>(date: &NaiveDate, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_date(*date))
}

/// Forecast rows falling in `[start, end)` for one forecast year
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForecastWindow {
    pub country_name: Option<String>,
    /// 1-based forecast year
    pub year: u32,
    #[serde(serialize_with = "serialize_date")]
    pub start: NaiveDate,
    #[serde(serialize_with = "serialize_date")]
    pub end: NaiveDate,
    pub rows: Vec<ForecastRow>,
    pub source: ForecastSource,
}

impl ForecastWindow {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Orchestrates cache lookup, regeneration and year windowing.
///
/// Lookup, regeneration and store for one (country, variable set) key run
/// under a per-key lock, so concurrent misses for the same key fit the model
/// once and later callers read the fresh artifact.
pub struct ForecastService<S> {
    store: S,
    engine: ForecastEngine,
    cache: ForecastCache,
    horizon_days: usize,
    variables: Vec<String>,
    key_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl<S: TimeSeriesStore> ForecastService<S> {
    /// Build a service from configuration
    pub fn new(store: S, config: &ForecastConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::with_parts(
            store,
            ForecastEngine::new(config.clamp_negative)?,
            ForecastCache::new(config.forecast_dir.clone()),
            config.horizon_days,
            config.target_variables.clone(),
        ))
    }

    /// Build a service from already constructed parts
    pub fn with_parts(
        store: S,
        engine: ForecastEngine,
        cache: ForecastCache,
        horizon_days: usize,
        variables: Vec<String>,
    ) -> Self {
        Self {
            store,
            engine,
            cache,
            horizon_days,
            variables,
            key_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn cache(&self) -> &ForecastCache {
        &self.cache
    }

    pub fn engine(&self) -> &ForecastEngine {
        &self.engine
    }

    /// Variables served by [`ForecastService::get_forecast_window`]
    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    /// Forecast rows of `country_name` for the `year`-th forecast year (default 1).
    ///
    /// A stored forecast is trusted as long as its artifact exists; otherwise
    /// the country's history is refit and stored before slicing.
    pub fn get_forecast_window(
        &self,
        country_name: Option<&str>,
        year: Option<u32>,
    ) -> Result<ForecastWindow> {
        let country = country_name
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| {
                ForecastError::ValidationError("country_name parameter is required.".to_string())
            })?;
        let year = year.unwrap_or(1);
        if year == 0 {
            return Err(ForecastError::ValidationError(
                "year must be 1 or greater".to_string(),
            ));
        }

        self.with_key_lock(Some(country), &self.variables, || {
            if let Some(record) = self.cache.find(Some(country), &self.variables)? {
                if self.cache.artifact_exists(&record) {
                    tracing::debug!(country, year, "serving cached forecast");
                    let series = self.cache.load(&record)?;
                    return window(Some(country), year, &series, ForecastSource::Cache);
                }
                tracing::warn!(
                    country,
                    path = %record.storage_path.display(),
                    "forecast artifact missing, regenerating"
                );
            }

            let (_, series) = self.regenerate(Some(country), &self.variables)?;
            window(Some(country), year, &series, ForecastSource::Regenerated)
        })
    }

    /// Fit and store a forecast for a country, or the global aggregate when
    /// `country_name` is `None`, replacing any existing record of the key.
    pub fn precompute(
        &self,
        country_name: Option<&str>,
        variables: &[String],
    ) -> Result<ForecastRecord> {
        let country = country_name.map(str::trim).filter(|c| !c.is_empty());
        self.with_key_lock(country, variables, || {
            let (record, _) = self.regenerate(country, variables)?;
            Ok(record)
        })
    }

    /// Number of keys currently locked or waited on
    pub fn active_key_locks(&self) -> usize {
        self.key_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn regenerate(
        &self,
        country_name: Option<&str>,
        variables: &[String],
    ) -> Result<(ForecastRecord, BTreeMap<String, ForecastSeries>)> {
        let label = country_name.unwrap_or(GLOBAL_KEY);
        let observations = self.store.observations(country_name, variables)?;
        if observations.is_empty() {
            return Err(ForecastError::NotFoundError(format!(
                "No data available for the country: {}.",
                label
            )));
        }

        tracing::info!(
            country = label,
            days = observations.len(),
            model = self.engine.model_name(),
            "generating forecast"
        );
        let series = self
            .engine
            .fit_and_forecast(&observations, variables, self.horizon_days)?;

        let mut record = ForecastRecord::new(self.engine.model_kind(), country_name, variables);
        record.storage_path = self.cache.store(record.clone(), &series)?;
        Ok((record, series))
    }

    /// Run `f` while holding the lock of the (country, variable set) key.
    ///
    /// The map entry lives only while someone holds or awaits it.
    fn with_key_lock<T>(
        &self,
        country_name: Option<&str>,
        variables: &[String],
        f: impl FnOnce() -> Result<T>,
    ) -> Result<T> {
        let key = lock_key(country_name, variables);
        let lock = {
            let mut locks = self.key_locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(key.clone()).or_default())
        };

        let result = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            f()
        };

        // Clones are only taken under the map lock, so the count cannot grow here.
        let mut locks = self.key_locks.lock().unwrap_or_else(PoisonError::into_inner);
        if Arc::strong_count(&lock) == 2 {
            locks.remove(&key);
        }
        result
    }
}

fn lock_key(country_name: Option<&str>, variables: &[String]) -> String {
    let mut sorted: Vec<&str> = variables.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    match country_name {
        Some(country) => format!("country:{}|{}", country.to_ascii_lowercase(), sorted.join(",")),
        None => format!("{}|{}", GLOBAL_KEY, sorted.join(",")),
    }
}

/// Slice every series to the `year`-th calendar year counted from the first forecast date.
fn window(
    country_name: Option<&str>,
    year: u32,
    series: &BTreeMap<String, ForecastSeries>,
    source: ForecastSource,
) -> Result<ForecastWindow> {
    let anchor = series
        .values()
        .filter_map(ForecastSeries::first_date)
        .min()
        .ok_or_else(|| ForecastError::StorageError("forecast holds no rows".to_string()))?;
    let (start, end) = year_window(anchor, year)?;

    let mut rows: BTreeMap<NaiveDate, BTreeMap<String, i64>> = BTreeMap::new();
    for (variable, forecast) in series {
        for point in forecast
            .points()
            .iter()
            .filter(|p| p.date >= start && p.date < end)
        {
            rows.entry(point.date)
                .or_default()
                .insert(variable.clone(), point.value);
        }
    }

    Ok(ForecastWindow {
        country_name: country_name.map(str::to_string),
        year,
        start,
        end,
        rows: rows
            .into_iter()
            .map(|(date, values)| ForecastRow { date, values })
            .collect(),
        source,
    })
}
