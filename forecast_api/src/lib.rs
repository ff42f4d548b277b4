//! # Forecast API
//!
//! axum surface over [`covid_forecast`]: `GET /country-forecast/` serves one
//! forecast year of a country, generating the forecast on first use.

pub mod config;
pub mod error;
pub mod routes;

use axum::{routing::get, Router};
use covid_forecast::{CovidDataStore, ForecastService, TimeSeriesStore};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub use crate::config::ServerConfig;
pub use crate::error::ApiError;

/// Log filter used when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "forecast_api=info,covid_forecast=info,tower_http=info";

/// Application state shared across handlers
pub struct AppState<S = CovidDataStore> {
    pub service: Arc<ForecastService<S>>,
    pub fit_timeout: Duration,
}

impl<S> AppState<S> {
    pub fn new(service: ForecastService<S>, fit_timeout: Duration) -> Self {
        Self {
            service: Arc::new(service),
            fit_timeout,
        }
    }
}

// Manual impl: the store itself need not be Clone.
impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            fit_timeout: self.fit_timeout,
        }
    }
}

/// Build the router with tracing and CORS middleware
pub fn create_router<S: TimeSeriesStore + 'static>(state: AppState<S>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(routes::health))
        .route("/country-forecast/", get(routes::country_forecast::<S>))
        .route("/country-forecast", get(routes::country_forecast::<S>))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Install the fmt subscriber, honouring `RUST_LOG`
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .init();
}
