//! # Pandemic Insights
//!
//! `pandemic_insights` bundles the COVID-19 forecasting crates of the workspace.
//!
//! - [`forecast`]: ARIMA fitting, the forecast cache and year-windowed retrieval
//! - [`api`]: the HTTP surface serving country forecasts
//!
//! ## Example
//!
//! ```
//! use pandemic_insights::forecast::ForecastConfig;
//!
//! let config = ForecastConfig::default();
//! assert_eq!(config.horizon_days, 3650);
//! assert_eq!(config.target_variables, vec!["deaths", "active", "recovered"]);
//! ```

pub use covid_forecast as forecast;
pub use forecast_api as api;

/// Build a forecast service over a data file and a forecast directory.
///
/// # Examples
///
/// ```no_run
/// let service = pandemic_insights::service_from_csv("data/covid_data.csv", "forecasts")?;
/// let window = service.get_forecast_window(Some("France"), None)?;
/// println!("{} rows", window.len());
/// # Ok::<(), pandemic_insights::forecast::ForecastError>(())
/// ```
pub fn service_from_csv(
    data_csv: impl AsRef<std::path::Path>,
    forecast_dir: impl Into<std::path::PathBuf>,
) -> forecast::Result<forecast::ForecastService<forecast::CovidDataStore>> {
    let config = forecast::ForecastConfig {
        forecast_dir: forecast_dir.into(),
        ..forecast::ForecastConfig::default()
    };
    let store = forecast::CovidDataStore::from_csv(data_csv)?;
    forecast::ForecastService::new(store, &config)
}
