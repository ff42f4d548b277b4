//! Precompute and store a forecast ahead of any request.
//!
//! Defaults to the global `confirmed` series:
//!
//! ```text
//! generate-forecasts --data data/covid_data.csv
//! generate-forecasts --country France --variables deaths,active,recovered
//! ```

use clap::Parser;
use covid_forecast::data::CONFIRMED;
use covid_forecast::{CovidDataStore, ForecastConfig, ForecastService};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "generate-forecasts", version, about = "Fit and store COVID-19 forecasts")]
struct Args {
    /// Normalised COVID-19 data file
    #[arg(long, env = "COVID_DATA_CSV", default_value = "data/covid_data.csv")]
    data: PathBuf,

    /// Country to forecast; the global aggregate when omitted
    #[arg(long)]
    country: Option<String>,

    /// Comma-separated variables to forecast
    #[arg(long, value_delimiter = ',', default_value = CONFIRMED)]
    variables: Vec<String>,

    /// Overrides FORECAST_DIR
    #[arg(long)]
    forecast_dir: Option<PathBuf>,

    /// Overrides FORECAST_HORIZON_DAYS
    #[arg(long)]
    horizon_days: Option<usize>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    forecast_api::init_tracing();
    let args = Args::parse();

    let mut config = ForecastConfig::from_env()?;
    if let Some(dir) = args.forecast_dir {
        config.forecast_dir = dir;
    }
    if let Some(days) = args.horizon_days {
        config.horizon_days = days;
    }

    let store = CovidDataStore::from_csv(&args.data)?;
    let service = ForecastService::new(store, &config)?;
    let record = service.precompute(args.country.as_deref(), &args.variables)?;

    tracing::info!(path = %record.storage_path.display(), "forecast generated");
    println!("{} stored at {}", record, record.storage_path.display());
    Ok(())
}
