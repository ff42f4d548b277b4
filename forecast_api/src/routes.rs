//! API route handlers

use crate::error::ApiError;
use crate::AppState;
use axum::extract::{Query, State};
use axum::Json;
use covid_forecast::data::{ACTIVE, DEATHS, RECOVERED};
use covid_forecast::utils::format_date;
use covid_forecast::{ForecastRow, TimeSeriesStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct CountryForecastQuery {
    pub country_name: Option<String>,
    /// Kept as text so a malformed year is reported as a JSON error
    pub year: Option<String>,
}

/// One day of a country forecast as returned to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountryForecastRow {
    pub date: String,
    pub deaths_forecast: i64,
    pub active_forecast: i64,
    pub recovered_forecast: i64,
}

impl TryFrom<&ForecastRow> for CountryForecastRow {
    type Error = ApiError;

    fn try_from(row: &ForecastRow) -> Result<Self, Self::Error> {
        let value = |variable: &str| {
            row.value(variable).ok_or_else(|| {
                ApiError::Internal(format!("forecast for {} has no {} value", row.date, variable))
            })
        };

        Ok(Self {
            date: format_date(row.date),
            deaths_forecast: value(DEATHS)?,
            active_forecast: value(ACTIVE)?,
            recovered_forecast: value(RECOVERED)?,
        })
    }
}

/// Liveness probe
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "alive",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// `GET /country-forecast/?country_name=<name>&year=<n>`
pub async fn country_forecast<S: TimeSeriesStore + 'static>(
    State(state): State<AppState<S>>,
    Query(query): Query<CountryForecastQuery>,
) -> Result<Json<Vec<CountryForecastRow>>, ApiError> {
    let year = parse_year(query.year.as_deref())?;
    let country = query.country_name;

    // Fitting is CPU bound; the task keeps running (and fills the cache) if the request times out.
    let service = Arc::clone(&state.service);
    let task = tokio::task::spawn_blocking(move || {
        service.get_forecast_window(country.as_deref(), year)
    });

    let window = match tokio::time::timeout(state.fit_timeout, task).await {
        Ok(joined) => joined.map_err(|e| ApiError::Internal(format!("forecast task failed: {}", e)))??,
        Err(_) => {
            tracing::warn!(timeout = ?state.fit_timeout, "forecast generation timed out");
            return Err(ApiError::Timeout(
                "Forecast generation is taking too long, retry shortly".to_string(),
            ));
        }
    };

    tracing::info!(
        country = window.country_name.as_deref().unwrap_or_default(),
        year = window.year,
        rows = window.len(),
        source = ?window.source,
        "serving country forecast"
    );

    let rows = window
        .rows
        .iter()
        .map(CountryForecastRow::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(rows))
}

fn parse_year(raw: Option<&str>) -> Result<Option<u32>, ApiError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(text) => text
            .parse::<u32>()
            .map(Some)
            .map_err(|_| ApiError::BadRequest("year must be a positive integer".to_string())),
    }
}
