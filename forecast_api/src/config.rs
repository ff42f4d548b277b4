//! Server configuration loaded from environment variables

use covid_forecast::{ForecastConfig, ForecastError, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Longest a request waits for a model fit, in seconds
pub const DEFAULT_FIT_TIMEOUT_SECS: u64 = 120;

/// Settings of the `forecast-api` server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the server listens on (e.g. "0.0.0.0:8080")
    pub bind_address: String,

    /// Normalised COVID-19 data file loaded at startup
    pub data_csv: PathBuf,

    /// Longest a request waits for a forecast to be generated
    pub fit_timeout: Duration,

    /// Forecast cache and engine settings
    pub forecast: ForecastConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let timeout_secs = match env::var("FORECAST_FIT_TIMEOUT_SECS") {
            Ok(raw) => raw.trim().parse::<u64>().ok().filter(|secs| *secs > 0).ok_or_else(|| {
                ForecastError::ConfigError(format!(
                    "FORECAST_FIT_TIMEOUT_SECS has an invalid value '{}'",
                    raw
                ))
            })?,
            Err(_) => DEFAULT_FIT_TIMEOUT_SECS,
        };

        Ok(Self {
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".into()),
            data_csv: env::var("COVID_DATA_CSV")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("data/covid_data.csv")),
            fit_timeout: Duration::from_secs(timeout_secs),
            forecast: ForecastConfig::from_env()?,
        })
    }
}
