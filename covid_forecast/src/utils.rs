//! Utility functions for the covid_forecast crate

use crate::error::{ForecastError, Result};
use chrono::{Datelike, Duration, NaiveDate};

/// Sentinel used in place of a country name for the global aggregate
pub const GLOBAL_KEY: &str = "global";

/// Consecutive daily dates starting the day after `last_observed`
pub fn future_dates(last_observed: NaiveDate, horizon: usize) -> Result<Vec<NaiveDate>> {
    let mut dates = Vec::with_capacity(horizon);
    let mut current = last_observed;

    for _ in 0..horizon {
        current = current.succ_opt().ok_or_else(|| {
            ForecastError::ValidationError(format!(
                "Forecast horizon of {} days runs past the supported date range",
                horizon
            ))
        })?;
        dates.push(current);
    }

    Ok(dates)
}

/// Number of whole days from `from` to `to` (negative when `to` is earlier)
pub fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days()
}

/// Date `days` after `date`
pub fn add_days(date: NaiveDate, days: i64) -> Result<NaiveDate> {
    date.checked_add_signed(Duration::days(days)).ok_or_else(|| {
        ForecastError::ValidationError(format!("{} + {} days is out of range", date, days))
    })
}

/// Half-open `[start, end)` range of the `year`-th forecast year.
///
/// Year 1 is the calendar year containing `anchor`, the first forecast date.
pub fn year_window(anchor: NaiveDate, year: u32) -> Result<(NaiveDate, NaiveDate)> {
    if year == 0 {
        return Err(ForecastError::ValidationError(
            "year must be 1 or greater".to_string(),
        ));
    }

    let calendar_year = i32::try_from(year - 1)
        .ok()
        .and_then(|offset| anchor.year().checked_add(offset))
        .ok_or_else(|| ForecastError::ValidationError(format!("year {} is out of range", year)))?;

    let start = NaiveDate::from_ymd_opt(calendar_year, 1, 1);
    let end = calendar_year
        .checked_add(1)
        .and_then(|next| NaiveDate::from_ymd_opt(next, 1, 1));

    match (start, end) {
        (Some(start), Some(end)) => Ok((start, end)),
        _ => Err(ForecastError::ValidationError(format!(
            "year {} is out of range",
            year
        ))),
    }
}

/// Calendar-date rendering used in every response and artifact
pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Slug of the global aggregate. Country slugs never start with `_`.
pub const GLOBAL_SLUG: &str = "_global";

/// File-system friendly key for a country (or the global aggregate).
///
/// Distinct for every pair of names that differ after trimming and ASCII
/// case folding: ASCII alphanumerics are kept, a space becomes `_` and any
/// other character is written as `-<hex code point>-`.
pub fn storage_slug(country_name: Option<&str>) -> String {
    let Some(name) = country_name.map(str::trim).filter(|n| !n.is_empty()) else {
        return GLOBAL_SLUG.to_string();
    };

    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if c == ' ' {
            slug.push('_');
        } else {
            slug.push_str(&format!("-{:x}-", c as u32));
        }
    }
    slug
}
