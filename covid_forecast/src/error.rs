//! Error types for the covid_forecast crate

use polars::prelude::PolarsError;
use thiserror::Error;

/// Custom error types for the covid_forecast crate
#[derive(Debug, Error)]
pub enum ForecastError {
    /// Missing or malformed request input
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// No historical data exists for the requested country
    #[error("Not found: {0}")]
    NotFoundError(String),

    /// A variable has no usable observations once nulls are dropped
    #[error("Insufficient data: {0}")]
    InsufficientDataError(String),

    /// The model could not be fitted to a variable's series
    #[error("Model fit error for '{variable}': {reason}")]
    ModelFitError { variable: String, reason: String },

    /// Forecast artifact or metadata could not be written or read
    #[error("Storage error: {0}")]
    StorageError(String),

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Error from IO operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error from Polars operations
    #[error("Polars error: {0}")]
    PolarsError(String),

    /// Error from reading historical CSV data
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// Error from the metadata index
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl ForecastError {
    /// Fit failure raised by a model, before the engine knows which variable it was fitting.
    pub(crate) fn model_fit(reason: impl Into<String>) -> Self {
        ForecastError::ModelFitError {
            variable: String::new(),
            reason: reason.into(),
        }
    }

    /// Attach the variable name to a model fit failure; other errors pass through.
    pub(crate) fn for_variable(self, name: &str) -> Self {
        match self {
            ForecastError::ModelFitError { reason, .. } => ForecastError::ModelFitError {
                variable: name.to_string(),
                reason,
            },
            other => other,
        }
    }

    /// Whether the caller caused the failure (bad input or no data) rather than the server.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ForecastError::ValidationError(_)
                | ForecastError::NotFoundError(_)
                | ForecastError::InsufficientDataError(_)
        )
    }
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, ForecastError>;

impl From<PolarsError> for ForecastError {
    fn from(err: PolarsError) -> Self {
        ForecastError::PolarsError(err.to_string())
    }
}
