use chrono::{Duration, NaiveDate};
use covid_forecast::engine::DEFAULT_HORIZON_DAYS;
use covid_forecast::{ForecastEngine, ForecastError, HistoricalData, Observation};
use rstest::rstest;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn daily(last: NaiveDate, values: &[i64]) -> Vec<Observation> {
    let n = values.len() as i64;
    values
        .iter()
        .enumerate()
        .map(|(i, v)| Observation::new(last - Duration::days(n - 1 - i as i64), Some(*v)))
        .collect()
}

fn trending(n: i64, start: i64, step: i64) -> Vec<i64> {
    (0..n)
        .map(|i| start + step * i + if i % 2 == 0 { 3 } else { -3 })
        .collect()
}

fn vars(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_horizon_starts_the_day_after_the_last_observation() {
    let last = date(2023, 3, 14);
    let data = HistoricalData::new().with_series("deaths", daily(last, &trending(90, 500, 4)));
    let engine = ForecastEngine::new(true).unwrap();

    let forecasts = engine
        .fit_and_forecast(&data, &vars(&["deaths"]), DEFAULT_HORIZON_DAYS)
        .unwrap();

    let deaths = &forecasts["deaths"];
    assert_eq!(deaths.variable(), "deaths");
    assert_eq!(deaths.column_name(), "deaths_forecast");
    assert_eq!(deaths.len(), DEFAULT_HORIZON_DAYS);
    assert_eq!(deaths.first_date(), Some(date(2023, 3, 15)));
    assert_eq!(
        deaths.last_date(),
        Some(date(2023, 3, 14) + Duration::days(DEFAULT_HORIZON_DAYS as i64))
    );
    for pair in deaths.points().windows(2) {
        assert_eq!(pair[1].date - pair[0].date, Duration::days(1));
    }
}

#[test]
fn test_variables_share_one_anchor() {
    let last = date(2023, 12, 31);
    let mut deaths = daily(last, &trending(100, 1_000, 3));
    // Deaths stopped being reported three days before the other variables.
    for obs in deaths.iter_mut().rev().take(3) {
        obs.value = None;
    }
    let data = HistoricalData::new()
        .with_series("deaths", deaths)
        .with_series("active", daily(last, &trending(100, 4_000, 12)));
    let engine = ForecastEngine::new(true).unwrap();

    let forecasts = engine
        .fit_and_forecast(&data, &vars(&["deaths", "active"]), 30)
        .unwrap();

    let deaths = &forecasts["deaths"];
    let active = &forecasts["active"];
    assert_eq!(deaths.len(), 30);
    assert_eq!(active.len(), 30);
    assert_eq!(deaths.first_date(), Some(date(2024, 1, 1)));
    assert_eq!(active.first_date(), Some(date(2024, 1, 1)));
}

#[test]
fn test_all_null_variable_is_insufficient() {
    let last = date(2023, 12, 31);
    let nulls = (0..30)
        .map(|i| Observation::new(last - Duration::days(i), None))
        .collect();
    let data = HistoricalData::new()
        .with_series("deaths", daily(last, &trending(30, 10, 1)))
        .with_series("recovered", nulls);
    let engine = ForecastEngine::new(true).unwrap();

    let result = engine.fit_and_forecast(&data, &vars(&["deaths", "recovered"]), 10);
    assert!(matches!(result, Err(ForecastError::InsufficientDataError(_))));

    let missing = engine.fit_and_forecast(&data, &vars(&["active"]), 10);
    assert!(matches!(missing, Err(ForecastError::InsufficientDataError(_))));
}

#[rstest]
#[case::single_day(vec![42])]
#[case::shorter_than_lag(vec![1, 2, 3, 4, 5, 6])]
#[case::constant(vec![9; 40])]
fn test_degenerate_series_fail_to_fit(#[case] values: Vec<i64>) {
    let data = HistoricalData::new().with_series("active", daily(date(2022, 5, 1), &values));
    let engine = ForecastEngine::new(true).unwrap();

    match engine.fit_and_forecast(&data, &vars(&["active"]), 100) {
        Err(ForecastError::ModelFitError { variable, reason }) => {
            assert_eq!(variable, "active");
            assert!(!reason.is_empty());
        }
        other => panic!("expected ModelFitError, got {:?}", other),
    }
}

#[test]
fn test_negative_forecasts_are_clamped() {
    // Falls by 50 a day and ends at 100, so the extrapolation crosses zero.
    let values = trending(150, 7_550, -50);
    let data = HistoricalData::new().with_series("active", daily(date(2022, 5, 1), &values));

    let clamped = ForecastEngine::new(true)
        .unwrap()
        .fit_and_forecast(&data, &vars(&["active"]), 365)
        .unwrap();
    let raw = ForecastEngine::new(false)
        .unwrap()
        .fit_and_forecast(&data, &vars(&["active"]), 365)
        .unwrap();

    assert!(clamped["active"].points().iter().all(|p| p.value >= 0));
    assert!(clamped["active"].points().iter().any(|p| p.value == 0));
    assert!(raw["active"].points().iter().any(|p| p.value < 0));
}

#[test]
fn test_engine_rejects_empty_requests() {
    let data = HistoricalData::new().with_series("deaths", daily(date(2022, 5, 1), &trending(30, 10, 1)));
    let engine = ForecastEngine::new(true).unwrap();

    assert!(matches!(
        engine.fit_and_forecast(&data, &vars(&["deaths"]), 0),
        Err(ForecastError::ValidationError(_))
    ));
    assert!(matches!(
        engine.fit_and_forecast(&data, &[], 10),
        Err(ForecastError::ValidationError(_))
    ));
}

#[test]
fn test_forecast_is_deterministic() {
    let data = HistoricalData::new().with_series("deaths", daily(date(2022, 5, 1), &trending(200, 10, 7)));
    let engine = ForecastEngine::new(true).unwrap();

    let a = engine.fit_and_forecast(&data, &vars(&["deaths"]), 500).unwrap();
    let b = engine.fit_and_forecast(&data, &vars(&["deaths"]), 500).unwrap();
    assert_eq!(a, b);
}
