use chrono::{Duration, NaiveDate};
use covid_forecast::{CovidDataStore, CovidRecord, ForecastConfig, ForecastService};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("COVID Forecast: Basic Forecasting Example");
    println!("=========================================\n");

    // Create sample data
    println!("Creating sample data...");
    let records = create_sample_records("Testland", 400);
    println!("Sample data created: {} daily rows\n", records.len());

    let forecast_dir = tempfile::tempdir()?;
    let config = ForecastConfig {
        forecast_dir: forecast_dir.path().to_path_buf(),
        ..ForecastConfig::default()
    };
    let service = ForecastService::new(CovidDataStore::from_records(records), &config)?;

    // First request fits ARIMA(5,1,0) for every variable and stores the result
    println!("Generating forecasts with {}...", service.engine().model_name());
    let first_year = service.get_forecast_window(Some("Testland"), Some(1))?;
    println!(
        "Year 1 ({} to {}): {} rows, source {:?}",
        first_year.start,
        first_year.end,
        first_year.len(),
        first_year.source
    );

    println!("\nFirst week:");
    for row in first_year.rows.iter().take(7) {
        println!(
            "  {}  deaths {:>6}  active {:>6}  recovered {:>6}",
            row.date,
            row.value("deaths").unwrap_or_default(),
            row.value("active").unwrap_or_default(),
            row.value("recovered").unwrap_or_default()
        );
    }

    // Later years are sliced from the stored artifact
    let third_year = service.get_forecast_window(Some("Testland"), Some(3))?;
    println!(
        "\nYear 3 ({} to {}): {} rows, source {:?}",
        third_year.start,
        third_year.end,
        third_year.len(),
        third_year.source
    );

    for record in service.cache().records()? {
        println!("\nStored: {} at {}", record, record.storage_path.display());
    }

    Ok(())
}

fn create_sample_records(country: &str, days: i64) -> Vec<CovidRecord> {
    let last = NaiveDate::from_ymd_opt(2023, 12, 31).unwrap_or_default();
    (0..days)
        .map(|i| CovidRecord {
            country_name: country.to_string(),
            province_state: None,
            file_date: Some(last - Duration::days(days - 1 - i)),
            confirmed: Some(10_000 + 40 * i),
            deaths: Some(1_000 + 3 * i + (i * 7) % 5),
            recovered: Some(2_000 + 15 * i + i % 4),
            active: Some(5_000 + 20 * i - (i * i) % 37),
        })
        .collect()
}
