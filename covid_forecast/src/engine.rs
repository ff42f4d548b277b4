//! Forecast generation: one ARIMA fit per variable over a shared daily index

use crate::data::{HistoricalData, Observation};
use crate::error::{ForecastError, Result};
use crate::models::arima::ArimaModel;
use crate::models::{ForecastModel, TrainedForecastModel};
use crate::utils::{add_days, days_between, future_dates};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Ten years of daily forecasts
pub const DEFAULT_HORIZON_DAYS: usize = 3650;
/// Autoregressive lag of the forecasting model
pub const AR_ORDER: usize = 5;
/// Differencing passes of the forecasting model
pub const DIFFERENCING_ORDER: usize = 1;
/// Moving-average terms of the forecasting model
pub const MA_ORDER: usize = 0;

/// Model family recorded in forecast metadata
pub const MODEL_KIND: &str = "ARIMA";

/// One forecast day of one variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub value: i64,
}

/// Contiguous daily forecast of a single variable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForecastSeries {
    variable: String,
    points: Vec<ForecastPoint>,
}

impl ForecastSeries {
    pub fn new(variable: impl Into<String>, points: Vec<ForecastPoint>) -> Self {
        Self {
            variable: variable.into(),
            points,
        }
    }

    /// Name of the forecast variable
    pub fn variable(&self) -> &str {
        &self.variable
    }

    /// Column name used in artifacts and responses
    pub fn column_name(&self) -> String {
        forecast_column(&self.variable)
    }

    pub fn points(&self) -> &[ForecastPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// First forecast date (the anchor date)
    pub fn first_date(&self) -> Option<NaiveDate> {
        self.points.first().map(|p| p.date)
    }

    /// Last forecast date
    pub fn last_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.date)
    }
}

/// `deaths` -> `deaths_forecast`
pub fn forecast_column(variable: &str) -> String {
    format!("{}_forecast", variable)
}

/// Fits one model per variable and produces fixed-horizon daily forecasts
#[derive(Debug, Clone)]
pub struct ForecastEngine {
    model: ArimaModel,
    clamp_negative: bool,
}

impl ForecastEngine {
    /// ARIMA(5,1,0) engine
    pub fn new(clamp_negative: bool) -> Result<Self> {
        Ok(Self::with_model(
            ArimaModel::new(AR_ORDER, DIFFERENCING_ORDER, MA_ORDER)?,
            clamp_negative,
        ))
    }

    /// Engine around a custom ARIMA order
    pub fn with_model(model: ArimaModel, clamp_negative: bool) -> Self {
        Self {
            model,
            clamp_negative,
        }
    }

    /// Model family recorded with stored forecasts
    pub fn model_kind(&self) -> &'static str {
        MODEL_KIND
    }

    /// Name of the underlying model, e.g. `ARIMA(5,1,0)`
    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// Whether negative forecasts are floored at zero
    pub fn clamps_negative(&self) -> bool {
        self.clamp_negative
    }

    /// Fit every variable and forecast `horizon_days` days past the last observation.
    ///
    /// All variables share the same anchor: the day after the latest observed
    /// date of any of them. A variable whose data stops earlier is forecast
    /// through the gap and the gap days are dropped.
    pub fn fit_and_forecast(
        &self,
        observations: &HistoricalData,
        variables: &[String],
        horizon_days: usize,
    ) -> Result<BTreeMap<String, ForecastSeries>> {
        if horizon_days == 0 {
            return Err(ForecastError::ValidationError(
                "horizon_days must be greater than zero".to_string(),
            ));
        }
        if variables.is_empty() {
            return Err(ForecastError::ValidationError(
                "at least one variable is required".to_string(),
            ));
        }

        let mut cleaned = Vec::with_capacity(variables.len());
        for variable in variables {
            let series = clean_series(observations.series(variable).unwrap_or_default());
            if series.is_empty() {
                return Err(ForecastError::InsufficientDataError(format!(
                    "no non-null observations for '{}'",
                    variable
                )));
            }
            cleaned.push((variable, series));
        }

        let last_observed = cleaned
            .iter()
            .filter_map(|(_, series)| series.last().map(|(date, _)| *date))
            .max()
            .ok_or_else(|| ForecastError::InsufficientDataError("no observations".to_string()))?;
        let dates = future_dates(last_observed, horizon_days)?;

        let mut forecasts = BTreeMap::new();
        for (variable, series) in cleaned {
            let own_last = series[series.len() - 1].0;
            let gap = usize::try_from(days_between(own_last, last_observed)).unwrap_or(0);
            let values: Vec<f64> = series.iter().map(|(_, v)| *v).collect();

            let trained = self
                .model
                .train(&values)
                .map_err(|e| e.for_variable(variable))?;
            let result = trained
                .forecast(gap + horizon_days)
                .map_err(|e| e.for_variable(variable))?;

            let points = dates
                .iter()
                .zip(result.values().iter().skip(gap))
                .map(|(date, value)| ForecastPoint {
                    date: *date,
                    value: self.round_count(*value),
                })
                .collect();

            tracing::debug!(
                variable = %variable,
                observations = values.len(),
                gap,
                "forecast generated"
            );
            forecasts.insert(variable.clone(), ForecastSeries::new(variable.clone(), points));
        }

        Ok(forecasts)
    }

    /// Counts cannot be fractional: round half to even, optionally floor at zero.
    fn round_count(&self, value: f64) -> i64 {
        let rounded = value.round_ties_even();
        if self.clamp_negative && rounded < 0.0 {
            0
        } else {
            rounded as i64
        }
    }
}

/// Drop nulls, order by date, keep the last value of a repeated date and
/// carry values forward over missing days.
pub fn clean_series(observations: &[Observation]) -> Vec<(NaiveDate, f64)> {
    let by_date: BTreeMap<NaiveDate, i64> = observations
        .iter()
        .filter_map(|obs| obs.value.map(|v| (obs.date, v)))
        .collect();

    let mut cleaned: Vec<(NaiveDate, f64)> = Vec::with_capacity(by_date.len());
    for (date, value) in by_date {
        if let Some(&(previous_date, previous_value)) = cleaned.last() {
            for offset in 1..days_between(previous_date, date) {
                // Both dates come from the map, so the fill dates are in range.
                if let Ok(fill) = add_days(previous_date, offset) {
                    cleaned.push((fill, previous_value));
                }
            }
        }
        cleaned.push((date, value as f64));
    }

    cleaned
}
