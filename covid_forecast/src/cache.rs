//! Durable storage of generated forecasts and their metadata
//!
//! Every (country, variable set) key owns one CSV artifact holding a `date`
//! column plus one `<variable>_forecast` column per variable. A JSON index in
//! the same directory keeps the live [`ForecastRecord`] of each key. Both files
//! are written to a temporary file first and renamed into place.

use crate::engine::{forecast_column, ForecastPoint, ForecastSeries};
use crate::error::{ForecastError, Result};
use crate::utils::{format_date, storage_slug};
use chrono::{DateTime, NaiveDate, Utc};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs::{self, File};
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tempfile::NamedTempFile;

/// Name of the date column in forecast artifacts
pub const DATE_COLUMN: &str = "date";

/// Metadata describing one stored forecast
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastRecord {
    /// Model family, e.g. `ARIMA`
    pub model_kind: String,
    /// Variables forecast in the artifact
    pub target_variables: BTreeSet<String>,
    /// Country the forecast covers, `None` for the global aggregate
    pub country_name: Option<String>,
    /// When the forecast was generated
    pub generated_at: DateTime<Utc>,
    /// Location of the CSV artifact
    pub storage_path: PathBuf,
}

impl ForecastRecord {
    /// New record stamped with the current time; the storage path is set by [`ForecastCache::store`].
    ///
    /// A blank country name denotes the global aggregate.
    pub fn new(model_kind: &str, country_name: Option<&str>, variables: &[String]) -> Self {
        Self {
            model_kind: model_kind.to_string(),
            target_variables: variables.iter().cloned().collect(),
            country_name: country_name
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string),
            generated_at: Utc::now(),
            storage_path: PathBuf::new(),
        }
    }

    /// Case-insensitive country match; `None` only matches the global record.
    pub fn matches_country(&self, country_name: Option<&str>) -> bool {
        match (self.country_name.as_deref(), country_name) {
            (Some(own), Some(other)) => own.trim().eq_ignore_ascii_case(other.trim()),
            (None, None) => true,
            _ => false,
        }
    }

    /// Same (country, variable set) key
    pub fn matches(&self, country_name: Option<&str>, variables: &BTreeSet<String>) -> bool {
        self.matches_country(country_name) && &self.target_variables == variables
    }
}

impl fmt::Display for ForecastRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let variables: Vec<&str> = self.target_variables.iter().map(String::as_str).collect();
        write!(
            f,
            "{} forecast for {} ({})",
            self.model_kind,
            variables.join(", "),
            self.country_name.as_deref().unwrap_or("Global")
        )
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct MetadataIndex {
    records: Vec<ForecastRecord>,
}

/// File-backed forecast cache rooted at one directory
#[derive(Debug)]
pub struct ForecastCache {
    root: PathBuf,
    index_lock: Mutex<()>,
}

impl ForecastCache {
    /// File name of the metadata index inside the cache directory
    pub const METADATA_FILE: &'static str = "forecast_metadata.json";

    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            index_lock: Mutex::new(()),
        }
    }

    /// Directory holding artifacts and the metadata index
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Deterministic artifact location for a (country, variable set) key
    pub fn artifact_path(&self, country_name: Option<&str>, variables: &BTreeSet<String>) -> PathBuf {
        let variables: Vec<&str> = variables.iter().map(String::as_str).collect();
        self.root.join(format!(
            "{}_{}_forecast.csv",
            storage_slug(country_name),
            variables.join("-")
        ))
    }

    /// Every live record
    pub fn records(&self) -> Result<Vec<ForecastRecord>> {
        let _guard = self.index_lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.read_index()?.records)
    }

    /// Most recently generated record for a country (`None` = global), whatever its variables
    pub fn lookup(&self, country_name: Option<&str>) -> Result<Option<ForecastRecord>> {
        Ok(self
            .records()?
            .into_iter()
            .filter(|r| r.matches_country(country_name))
            .max_by_key(|r| r.generated_at))
    }

    /// Record for the exact (country, variable set) key
    pub fn find(&self, country_name: Option<&str>, variables: &[String]) -> Result<Option<ForecastRecord>> {
        let variables: BTreeSet<String> = variables.iter().cloned().collect();
        Ok(self
            .records()?
            .into_iter()
            .find(|r| r.matches(country_name, &variables)))
    }

    /// Whether the record's artifact is still on disk
    pub fn artifact_exists(&self, record: &ForecastRecord) -> bool {
        record.storage_path.is_file()
    }

    /// Write the artifact for `series`, then persist `record` pointing at it.
    ///
    /// Replaces any existing record of the same key. Returns the artifact path.
    pub fn store(
        &self,
        mut record: ForecastRecord,
        series: &BTreeMap<String, ForecastSeries>,
    ) -> Result<PathBuf> {
        let variables: BTreeSet<String> = series.keys().cloned().collect();
        if series.is_empty() || variables != record.target_variables {
            return Err(ForecastError::StorageError(format!(
                "record variables {:?} do not match forecast series {:?}",
                record.target_variables, variables
            )));
        }

        fs::create_dir_all(&self.root)?;
        let path = self.artifact_path(record.country_name.as_deref(), &variables);

        let mut frame = Self::build_frame(series)?;
        let mut tmp = NamedTempFile::new_in(&self.root)?;
        CsvWriter::new(tmp.as_file_mut())
            .has_header(true)
            .finish(&mut frame)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| ForecastError::IoError(e.error))?;

        record.storage_path = path.clone();
        {
            let _guard = self.index_lock.lock().unwrap_or_else(PoisonError::into_inner);
            let mut index = self.read_index()?;
            let country = record.country_name.clone();
            index
                .records
                .retain(|r| !r.matches(country.as_deref(), &record.target_variables));
            index.records.push(record);
            self.write_index(&index)?;
        }

        tracing::info!(path = %path.display(), rows = frame.height(), "stored forecast artifact");
        Ok(path)
    }

    /// Read a record's artifact back into per-variable series
    pub fn load(&self, record: &ForecastRecord) -> Result<BTreeMap<String, ForecastSeries>> {
        let file = File::open(&record.storage_path)?;
        let frame = CsvReader::new(file)
            .infer_schema(None)
            .has_header(true)
            .finish()?;

        let date_column = frame.column(DATE_COLUMN)?.cast(&DataType::Utf8)?;
        let dates = date_column
            .utf8()?
            .into_iter()
            .map(|cell| {
                let text = cell.ok_or_else(|| {
                    ForecastError::StorageError(format!(
                        "{} has an empty date cell",
                        record.storage_path.display()
                    ))
                })?;
                NaiveDate::parse_from_str(text, "%Y-%m-%d").map_err(|e| {
                    ForecastError::StorageError(format!("invalid date '{}': {}", text, e))
                })
            })
            .collect::<Result<Vec<NaiveDate>>>()?;

        let mut series = BTreeMap::new();
        for variable in &record.target_variables {
            let column = frame
                .column(&forecast_column(variable))?
                .cast(&DataType::Int64)?;
            let points = dates
                .iter()
                .zip(column.i64()?.into_iter())
                .filter_map(|(date, value)| {
                    value.map(|value| ForecastPoint { date: *date, value })
                })
                .collect();
            series.insert(variable.clone(), ForecastSeries::new(variable.clone(), points));
        }

        Ok(series)
    }

    /// Outer join of every series on date, one row per day.
    fn build_frame(series: &BTreeMap<String, ForecastSeries>) -> Result<DataFrame> {
        let mut rows: BTreeMap<NaiveDate, BTreeMap<&str, i64>> = BTreeMap::new();
        for (variable, forecast) in series {
            for point in forecast.points() {
                rows.entry(point.date)
                    .or_default()
                    .insert(variable.as_str(), point.value);
            }
        }

        let dates: Vec<String> = rows.keys().map(|d| format_date(*d)).collect();
        let mut columns = vec![Series::new(DATE_COLUMN, dates)];
        for variable in series.keys() {
            let values: Vec<Option<i64>> = rows
                .values()
                .map(|row| row.get(variable.as_str()).copied())
                .collect();
            columns.push(Series::new(&forecast_column(variable), values));
        }

        Ok(DataFrame::new(columns)?)
    }

    fn index_path(&self) -> PathBuf {
        self.root.join(Self::METADATA_FILE)
    }

    fn read_index(&self) -> Result<MetadataIndex> {
        let path = self.index_path();
        if !path.exists() {
            return Ok(MetadataIndex::default());
        }
        let reader = BufReader::new(File::open(&path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    fn write_index(&self, index: &MetadataIndex) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        let mut tmp = NamedTempFile::new_in(&self.root)?;
        serde_json::to_writer_pretty(&mut tmp, index)?;
        tmp.flush()?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.index_path())
            .map_err(|e| ForecastError::IoError(e.error))?;
        Ok(())
    }
}
