//! Historical time series data feeding the forecasts

use crate::error::{ForecastError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::path::Path;

/// Cumulative confirmed cases
pub const CONFIRMED: &str = "confirmed";
/// Cumulative deaths
pub const DEATHS: &str = "deaths";
/// Cumulative recoveries
pub const RECOVERED: &str = "recovered";
/// Currently active cases
pub const ACTIVE: &str = "active";

/// Every variable the historical store can serve
pub const KNOWN_VARIABLES: [&str; 4] = [CONFIRMED, DEATHS, RECOVERED, ACTIVE];

/// A single daily observation of one variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    /// Calendar date of the observation
    pub date: NaiveDate,
    /// Observed count, `None` when the source had no value
    pub value: Option<i64>,
}

impl Observation {
    pub fn new(date: NaiveDate, value: Option<i64>) -> Self {
        Self { date, value }
    }
}

/// Observations for a set of variables, keyed by variable name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoricalData {
    series: BTreeMap<String, Vec<Observation>>,
}

impl HistoricalData {
    /// Create an empty set of series
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) the observations of a variable
    pub fn insert(&mut self, variable: impl Into<String>, observations: Vec<Observation>) {
        self.series.insert(variable.into(), observations);
    }

    /// Builder-style variant of [`HistoricalData::insert`]
    pub fn with_series(mut self, variable: impl Into<String>, observations: Vec<Observation>) -> Self {
        self.insert(variable, observations);
        self
    }

    /// Observations of a variable, if present
    pub fn series(&self, variable: &str) -> Option<&[Observation]> {
        self.series.get(variable).map(Vec::as_slice)
    }

    /// Names of the variables held
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    /// True when no variable holds a single observation row
    pub fn is_empty(&self) -> bool {
        self.series.values().all(Vec::is_empty)
    }

    /// Number of distinct dates across all variables
    pub fn len(&self) -> usize {
        self.series
            .values()
            .flatten()
            .map(|obs| obs.date)
            .collect::<BTreeSet<_>>()
            .len()
    }

    /// Latest date carrying a non-null value in any variable
    pub fn last_date(&self) -> Option<NaiveDate> {
        self.series
            .values()
            .flatten()
            .filter(|obs| obs.value.is_some())
            .map(|obs| obs.date)
            .max()
    }
}

/// Read-only source of historical observations
pub trait TimeSeriesStore: Send + Sync {
    /// Ordered observations for a country (`None` for the global aggregate).
    ///
    /// Rows without a date never reach the caller. An unknown country yields
    /// an empty [`HistoricalData`], not an error.
    fn observations(&self, country_name: Option<&str>, variables: &[String])
        -> Result<HistoricalData>;
}

/// One row of the normalised COVID-19 data file
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CovidRecord {
    #[serde(rename = "Country_Region")]
    pub country_name: String,
    #[serde(rename = "Province_State", default)]
    pub province_state: Option<String>,
    #[serde(rename = "File_Date", default)]
    pub file_date: Option<NaiveDate>,
    #[serde(rename = "Confirmed", default, deserialize_with = "deserialize_count")]
    pub confirmed: Option<i64>,
    #[serde(rename = "Deaths", default, deserialize_with = "deserialize_count")]
    pub deaths: Option<i64>,
    #[serde(rename = "Recovered", default, deserialize_with = "deserialize_count")]
    pub recovered: Option<i64>,
    #[serde(rename = "Active", default, deserialize_with = "deserialize_count")]
    pub active: Option<i64>,
}

impl CovidRecord {
    /// Value of a named variable for this row
    pub fn value(&self, variable: &str) -> Result<Option<i64>> {
        match variable {
            CONFIRMED => Ok(self.confirmed),
            DEATHS => Ok(self.deaths),
            RECOVERED => Ok(self.recovered),
            ACTIVE => Ok(self.active),
            other => Err(ForecastError::ValidationError(format!(
                "Unknown variable '{}', expected one of {:?}",
                other, KNOWN_VARIABLES
            ))),
        }
    }

    fn matches_country(&self, country_name: &str) -> bool {
        self.country_name.trim().eq_ignore_ascii_case(country_name.trim())
    }
}

// Counts are exported as floats ("12.0") by some upstream tools.
fn deserialize_count<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<f64> = Option::deserialize(deserializer)?;
    Ok(value.filter(|v| v.is_finite()).map(|v| v.trunc() as i64))
}

/// In-memory historical store backed by the normalised `covid_data.csv`
#[derive(Debug, Clone, Default)]
pub struct CovidDataStore {
    records: Vec<CovidRecord>,
}

impl CovidDataStore {
    /// Columns that must be present in the data file
    const REQUIRED_COLUMNS: [&'static str; 2] = ["Country_Region", "File_Date"];

    /// Load every row of a COVID-19 data CSV file.
    ///
    /// Rows that fail to parse are skipped with a warning; a file lacking the
    /// country or date column is rejected outright.
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let mut reader = csv::Reader::from_reader(file);

        let headers = reader.headers()?.clone();
        for required in Self::REQUIRED_COLUMNS {
            if !headers.iter().any(|h| h == required) {
                return Err(ForecastError::StorageError(format!(
                    "{} is missing the '{}' column",
                    path.display(),
                    required
                )));
            }
        }

        let mut records = Vec::new();
        let mut skipped = 0usize;
        for (line, row) in reader.deserialize::<CovidRecord>().enumerate() {
            match row {
                Ok(record) => records.push(record),
                Err(err) => {
                    skipped += 1;
                    tracing::warn!(line = line + 2, error = %err, "skipping malformed covid data row");
                }
            }
        }

        tracing::info!(
            path = %path.display(),
            rows = records.len(),
            skipped,
            "loaded covid data"
        );
        Ok(Self { records })
    }

    /// Build a store from already parsed rows
    pub fn from_records(records: Vec<CovidRecord>) -> Self {
        Self { records }
    }

    /// Number of rows held
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the store holds no rows
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Distinct country names, sorted
    pub fn countries(&self) -> Vec<String> {
        self.records
            .iter()
            .map(|r| r.country_name.trim().to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

impl TimeSeriesStore for CovidDataStore {
    fn observations(
        &self,
        country_name: Option<&str>,
        variables: &[String],
    ) -> Result<HistoricalData> {
        // Province rows are summed per day; a day where every row is null stays null.
        let mut daily: BTreeMap<&str, BTreeMap<NaiveDate, Option<i64>>> = BTreeMap::new();
        for variable in variables {
            if !KNOWN_VARIABLES.contains(&variable.as_str()) {
                return Err(ForecastError::ValidationError(format!(
                    "Unknown variable '{}', expected one of {:?}",
                    variable, KNOWN_VARIABLES
                )));
            }
            daily.insert(variable.as_str(), BTreeMap::new());
        }

        let rows = self.records.iter().filter(|r| match country_name {
            Some(name) => r.matches_country(name),
            None => true,
        });

        for record in rows {
            let Some(date) = record.file_date else {
                continue;
            };
            for variable in variables {
                let value = record.value(variable)?;
                if let Some(per_day) = daily.get_mut(variable.as_str()) {
                    let slot = per_day.entry(date).or_insert(None);
                    if let Some(v) = value {
                        *slot = Some(slot.unwrap_or(0) + v);
                    }
                }
            }
        }

        let mut data = HistoricalData::new();
        for (variable, per_day) in daily {
            let observations = per_day
                .into_iter()
                .map(|(date, value)| Observation::new(date, value))
                .collect();
            data.insert(variable, observations);
        }
        Ok(data)
    }
}
