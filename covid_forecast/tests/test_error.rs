use covid_forecast::{CovidDataStore, ForecastError, TimeSeriesStore};
use std::io;

#[test]
fn test_error_conversion() {
    let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
    let forecast_error = ForecastError::from(io_error);
    assert!(matches!(forecast_error, ForecastError::IoError(_)));

    let json_error = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    let forecast_error = ForecastError::from(json_error);
    assert!(matches!(forecast_error, ForecastError::JsonError(_)));
}

#[test]
fn test_error_display() {
    let error = ForecastError::ModelFitError {
        variable: "deaths".to_string(),
        reason: "series is constant after differencing".to_string(),
    };
    assert_eq!(
        error.to_string(),
        "Model fit error for 'deaths': series is constant after differencing"
    );

    let error = ForecastError::NotFoundError("No data available for the country: Atlantis.".to_string());
    assert!(error.to_string().contains("Atlantis"));

    let io_error = io::Error::new(io::ErrorKind::PermissionDenied, "permission denied");
    let error_string = ForecastError::from(io_error).to_string();
    assert!(error_string.contains("IO error"));
    assert!(error_string.contains("permission denied"));
}

#[test]
fn test_client_errors() {
    assert!(ForecastError::ValidationError("year".to_string()).is_client_error());
    assert!(ForecastError::NotFoundError("Atlantis".to_string()).is_client_error());
    assert!(ForecastError::InsufficientDataError("deaths".to_string()).is_client_error());

    assert!(!ForecastError::StorageError("disk full".to_string()).is_client_error());
    assert!(!ForecastError::ModelFitError {
        variable: "active".to_string(),
        reason: "diverged".to_string(),
    }
    .is_client_error());
}

#[test]
fn test_unknown_variable_names_the_variable() {
    let store = CovidDataStore::default();
    match store.observations(None, &["hospitalised".to_string()]) {
        Err(ForecastError::ValidationError(msg)) => assert!(msg.contains("hospitalised")),
        other => panic!("expected ValidationError, got {:?}", other),
    }
}
