//! # COVID Forecast
//!
//! Time series forecasting for COVID-19 statistics: fits an ARIMA(5,1,0)
//! model per country and variable, stores ten-year daily forecasts on disk
//! and serves them one forecast year at a time.
//!
//! ## Features
//!
//! - Historical data access through the [`TimeSeriesStore`] trait, with a CSV-backed
//!   [`CovidDataStore`]
//! - Deterministic ARIMA fitting (Yule-Walker / Levinson-Durbin)
//! - File-backed forecast cache with atomic writes and a JSON metadata index
//! - Year-windowed retrieval that regenerates missing forecasts under a per-country lock
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use covid_forecast::{CovidDataStore, ForecastConfig, ForecastService};
//!
//! let store = CovidDataStore::from_csv("data/covid_data.csv")?;
//! let service = ForecastService::new(store, &ForecastConfig::default())?;
//!
//! // First forecast year for France, fitted on the first request
//! let window = service.get_forecast_window(Some("France"), Some(1))?;
//! for row in &window.rows {
//!     println!("{} {:?}", row.date, row.values);
//! }
//! # Ok::<(), covid_forecast::ForecastError>(())
//! ```

pub mod cache;
pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod models;
pub mod service;
pub mod utils;

// Re-export commonly used types
pub use crate::cache::{ForecastCache, ForecastRecord};
pub use crate::config::ForecastConfig;
pub use crate::data::{CovidDataStore, CovidRecord, HistoricalData, Observation, TimeSeriesStore};
pub use crate::engine::{ForecastEngine, ForecastPoint, ForecastSeries};
pub use crate::error::{ForecastError, Result};
pub use crate::models::{ForecastModel, ForecastResult, TrainedForecastModel};
pub use crate::service::{ForecastRow, ForecastService, ForecastSource, ForecastWindow};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
