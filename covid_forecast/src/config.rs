//! Forecast configuration loaded from environment variables

use crate::data::{ACTIVE, DEATHS, RECOVERED};
use crate::engine::DEFAULT_HORIZON_DAYS;
use crate::error::{ForecastError, Result};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Settings shared by the forecast service and the precompute command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForecastConfig {
    /// Directory holding forecast artifacts and the metadata index
    pub forecast_dir: PathBuf,

    /// Number of days forecast per run
    pub horizon_days: usize,

    /// Floor negative forecasts at zero
    pub clamp_negative: bool,

    /// Variables served by the per-country forecast endpoint
    pub target_variables: Vec<String>,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            forecast_dir: PathBuf::from("forecasts"),
            horizon_days: DEFAULT_HORIZON_DAYS,
            clamp_negative: true,
            target_variables: vec![DEATHS.to_string(), ACTIVE.to_string(), RECOVERED.to_string()],
        }
    }
}

impl ForecastConfig {
    /// Load configuration from environment variables, falling back to defaults.
    ///
    /// - `FORECAST_DIR`
    /// - `FORECAST_HORIZON_DAYS`
    /// - `FORECAST_CLAMP_NEGATIVE`
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let config = Self {
            forecast_dir: env::var("FORECAST_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.forecast_dir),
            horizon_days: parse_var("FORECAST_HORIZON_DAYS")?.unwrap_or(defaults.horizon_days),
            clamp_negative: parse_var("FORECAST_CLAMP_NEGATIVE")?.unwrap_or(defaults.clamp_negative),
            target_variables: defaults.target_variables,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.horizon_days == 0 {
            return Err(ForecastError::ConfigError(
                "horizon_days must be greater than zero".to_string(),
            ));
        }
        if self.target_variables.is_empty() {
            return Err(ForecastError::ConfigError(
                "at least one target variable is required".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_var<T: FromStr>(name: &str) -> Result<Option<T>> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ForecastError::ConfigError(format!("{} has an invalid value '{}'", name, raw))),
        Err(_) => Ok(None),
    }
}
