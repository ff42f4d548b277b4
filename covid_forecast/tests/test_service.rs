use chrono::{Duration, NaiveDate};
use covid_forecast::data::CONFIRMED;
use covid_forecast::{
    CovidDataStore, CovidRecord, ForecastCache, ForecastConfig, ForecastError, ForecastPoint,
    ForecastRecord, ForecastSeries, ForecastService, ForecastSource, HistoricalData,
    TimeSeriesStore,
};
use pretty_assertions::assert_eq;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

/// Store wrapper counting how often history is queried
struct CountingStore {
    inner: CovidDataStore,
    calls: AtomicUsize,
}

impl CountingStore {
    fn new(inner: CovidDataStore) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TimeSeriesStore for CountingStore {
    fn observations(
        &self,
        country_name: Option<&str>,
        variables: &[String],
    ) -> covid_forecast::Result<HistoricalData> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.observations(country_name, variables)
    }
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

// 400 daily observations ending 2023-12-31
fn country_history(country: &str, days: i64) -> Vec<CovidRecord> {
    let last = date(2023, 12, 31);
    (0..days)
        .map(|i| CovidRecord {
            country_name: country.to_string(),
            province_state: None,
            file_date: Some(last - Duration::days(days - 1 - i)),
            confirmed: Some(10_000 + 40 * i + (i * 7) % 11),
            deaths: Some(1_000 + 3 * i + (i * 7) % 5),
            recovered: Some(2_000 + 15 * i + i % 4),
            active: Some(5_000 + 20 * i - (i * i) % 37),
        })
        .collect()
}

fn service_with(records: Vec<CovidRecord>, dir: &TempDir) -> ForecastService<CountingStore> {
    let config = ForecastConfig {
        forecast_dir: dir.path().to_path_buf(),
        ..ForecastConfig::default()
    };
    ForecastService::new(CountingStore::new(CovidDataStore::from_records(records)), &config).unwrap()
}

#[test]
fn test_testland_first_year() {
    let dir = TempDir::new().unwrap();
    let service = service_with(country_history("Testland", 400), &dir);

    let window = service.get_forecast_window(Some("Testland"), Some(1)).unwrap();

    assert_eq!(window.source, ForecastSource::Regenerated);
    assert_eq!(window.start, date(2024, 1, 1));
    assert_eq!(window.end, date(2025, 1, 1));
    // 2024 is a leap year
    assert_eq!(window.len(), 366);
    assert_eq!(window.rows[0].date, date(2024, 1, 1));
    assert_eq!(window.rows[365].date, date(2024, 12, 31));
    for row in &window.rows {
        assert!(row.value("deaths").is_some());
        assert!(row.value("active").is_some());
        assert!(row.value("recovered").is_some());
    }
    assert_eq!(service.store().calls(), 1);
}

#[test]
fn test_second_request_is_served_from_cache() {
    let dir = TempDir::new().unwrap();
    let service = service_with(country_history("Testland", 400), &dir);

    let first = service.get_forecast_window(Some("Testland"), None).unwrap();
    let second = service.get_forecast_window(Some("testland"), None).unwrap();

    assert_eq!(second.source, ForecastSource::Cache);
    assert_eq!(first.rows, second.rows);
    assert_eq!(service.store().calls(), 1);
}

#[test]
fn test_cached_forecast_never_touches_history() {
    let dir = TempDir::new().unwrap();
    let service = service_with(Vec::new(), &dir);

    let variables = service.variables().to_vec();
    let mut series = BTreeMap::new();
    for (offset, variable) in variables.iter().enumerate() {
        let points = (0..800)
            .map(|i| ForecastPoint {
                date: date(2030, 6, 1) + Duration::days(i),
                value: i * 10 + offset as i64,
            })
            .collect();
        series.insert(variable.clone(), ForecastSeries::new(variable.clone(), points));
    }
    let record = ForecastRecord::new("ARIMA", Some("Cacheland"), &variables);
    service.cache().store(record, &series).unwrap();

    // Anchor 2030-06-01: year 2 is calendar 2031.
    let window = service.get_forecast_window(Some("Cacheland"), Some(2)).unwrap();

    assert_eq!(window.source, ForecastSource::Cache);
    assert_eq!(window.len(), 365);
    assert_eq!(window.rows[0].date, date(2031, 1, 1));
    let offset = (date(2031, 1, 1) - date(2030, 6, 1)).num_days();
    assert_eq!(window.rows[0].value("deaths"), Some(offset * 10));
    assert!(window
        .rows
        .iter()
        .all(|row| row.date >= date(2031, 1, 1) && row.date < date(2032, 1, 1)));
    assert_eq!(service.store().calls(), 0);
}

#[test]
fn test_missing_artifact_triggers_regeneration() {
    let dir = TempDir::new().unwrap();
    let service = service_with(country_history("Testland", 400), &dir);

    service.get_forecast_window(Some("Testland"), None).unwrap();
    let record = service
        .cache()
        .find(Some("Testland"), service.variables())
        .unwrap()
        .unwrap();
    std::fs::remove_file(&record.storage_path).unwrap();

    let window = service.get_forecast_window(Some("Testland"), None).unwrap();

    assert_eq!(window.source, ForecastSource::Regenerated);
    assert!(record.storage_path.is_file());
    assert_eq!(service.store().calls(), 2);
    // Still one live record for the key.
    let records = service.cache().records().unwrap();
    assert_eq!(records.len(), 1);
}

#[test]
fn test_regenerated_forecast_covers_full_horizon() {
    let dir = TempDir::new().unwrap();
    let service = service_with(country_history("Testland", 400), &dir);

    service.get_forecast_window(Some("Testland"), None).unwrap();
    let record = service.cache().lookup(Some("TESTLAND")).unwrap().unwrap();
    let series = service.cache().load(&record).unwrap();

    assert_eq!(record.model_kind, "ARIMA");
    assert_eq!(series.len(), 3);
    for forecast in series.values() {
        assert_eq!(forecast.len(), 3650);
        assert_eq!(forecast.first_date(), Some(date(2024, 1, 1)));
        for pair in forecast.points().windows(2) {
            assert_eq!(pair[1].date - pair[0].date, Duration::days(1));
        }
    }
}

#[test]
fn test_year_windows_near_the_end_of_the_horizon() {
    let dir = TempDir::new().unwrap();
    let service = service_with(country_history("Testland", 400), &dir);

    // 3650 days from 2024-01-01 end on 2033-12-28.
    let tenth = service.get_forecast_window(Some("Testland"), Some(10)).unwrap();
    assert_eq!(tenth.len(), 362);
    assert_eq!(tenth.rows.last().map(|r| r.date), Some(date(2033, 12, 28)));

    let eleventh = service.get_forecast_window(Some("Testland"), Some(11)).unwrap();
    assert!(eleventh.is_empty());
}

#[test]
fn test_missing_country_is_rejected_before_any_access() {
    let dir = TempDir::new().unwrap();
    let service = service_with(country_history("Testland", 400), &dir);

    for country in [None, Some(""), Some("   ")] {
        let result = service.get_forecast_window(country, Some(1));
        assert!(matches!(result, Err(ForecastError::ValidationError(_))));
    }
    assert_eq!(service.store().calls(), 0);
    assert!(service.cache().records().unwrap().is_empty());
}

#[test]
fn test_year_zero_is_rejected() {
    let dir = TempDir::new().unwrap();
    let service = service_with(country_history("Testland", 400), &dir);

    let result = service.get_forecast_window(Some("Testland"), Some(0));
    assert!(matches!(result, Err(ForecastError::ValidationError(_))));
    assert_eq!(service.store().calls(), 0);
}

#[test]
fn test_country_without_history_is_not_found() {
    let dir = TempDir::new().unwrap();
    let service = service_with(country_history("Testland", 400), &dir);

    let result = service.get_forecast_window(Some("Atlantis"), None);
    assert!(matches!(result, Err(ForecastError::NotFoundError(_))));
    assert!(service.cache().records().unwrap().is_empty());
}

#[test]
fn test_single_day_history_fails_to_fit() {
    let dir = TempDir::new().unwrap();
    let service = service_with(country_history("Tinyland", 1), &dir);

    let result = service.get_forecast_window(Some("Tinyland"), None);
    match result {
        Err(ForecastError::ModelFitError { variable, .. }) => assert!(!variable.is_empty()),
        other => panic!("expected ModelFitError, got {:?}", other),
    }
    assert!(service.cache().records().unwrap().is_empty());
}

#[test]
fn test_concurrent_misses_fit_once() {
    let dir = TempDir::new().unwrap();
    let service = service_with(country_history("Testland", 400), &dir);

    let windows: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| scope.spawn(|| service.get_forecast_window(Some("Testland"), Some(1))))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap().unwrap()).collect()
    });

    assert_eq!(service.store().calls(), 1);
    assert_eq!(
        windows
            .iter()
            .filter(|w| w.source == ForecastSource::Regenerated)
            .count(),
        1
    );
    assert!(windows.iter().all(|w| w.rows == windows[0].rows));
    assert_eq!(service.active_key_locks(), 0);
}

#[test]
fn test_unknown_countries_leave_no_lock_entries() {
    let dir = TempDir::new().unwrap();
    let service = service_with(country_history("Testland", 400), &dir);

    for i in 0..200 {
        let name = format!("Nowhere {}", i);
        let result = service.get_forecast_window(Some(&name), None);
        assert!(matches!(result, Err(ForecastError::NotFoundError(_))));
    }
    assert_eq!(service.active_key_locks(), 0);

    service.get_forecast_window(Some("Testland"), None).unwrap();
    service.get_forecast_window(Some("Testland"), Some(2)).unwrap();
    assert_eq!(service.active_key_locks(), 0);
}

#[test]
fn test_punctuated_country_is_served_its_own_forecast() {
    let dir = TempDir::new().unwrap();
    let mut records = country_history("Taiwan", 400);
    let mut starred = country_history("Taiwan*", 400);
    for record in &mut starred {
        record.deaths = record.deaths.map(|d| d * 10);
    }
    records.extend(starred);
    let service = service_with(records, &dir);

    let plain = service.get_forecast_window(Some("Taiwan"), None).unwrap();
    let other = service.get_forecast_window(Some("Taiwan*"), None).unwrap();
    assert_ne!(plain.rows, other.rows);

    let cached = service.get_forecast_window(Some("Taiwan"), None).unwrap();
    assert_eq!(cached.source, ForecastSource::Cache);
    assert_eq!(cached.rows, plain.rows);
    assert_eq!(service.cache().records().unwrap().len(), 2);
}

#[test]
fn test_precompute_global_forecast() {
    let dir = TempDir::new().unwrap();
    let mut records = country_history("Testland", 120);
    records.extend(country_history("Otherland", 120));
    let service = service_with(records, &dir);

    let record = service
        .precompute(None, &[CONFIRMED.to_string()])
        .unwrap();

    assert_eq!(record.country_name, None);
    assert!(record.storage_path.is_file());
    assert_eq!(service.cache().lookup(None).unwrap(), Some(record.clone()));
    assert_eq!(service.cache().lookup(Some("Testland")).unwrap(), None);

    let cache = ForecastCache::new(dir.path());
    let series = cache.load(&record).unwrap();
    assert_eq!(series["confirmed"].len(), 3650);
}
