//! `forecast-api` server entry point

use covid_forecast::{CovidDataStore, ForecastService};
use forecast_api::{create_router, init_tracing, AppState, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file (optional - won't fail if missing)
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ServerConfig::from_env()?;
    let store = CovidDataStore::from_csv(&config.data_csv)?;
    tracing::info!(
        countries = store.countries().len(),
        forecast_dir = %config.forecast.forecast_dir.display(),
        "historical data loaded"
    );

    let service = ForecastService::new(store, &config.forecast)?;
    let app = create_router(AppState::new(service, config.fit_timeout));

    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    tracing::info!(
        "forecast-api v{} listening on {}",
        env!("CARGO_PKG_VERSION"),
        config.bind_address
    );

    axum::serve(listener, app).await?;

    Ok(())
}
