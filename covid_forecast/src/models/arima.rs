//! ARIMA models for time series forecasting
//!
//! Only the autoregressive and integrated parts are estimated. AR coefficients
//! come from the Yule-Walker equations solved with the Levinson-Durbin
//! recursion, so fitting is deterministic and needs no optimiser. The model
//! carries no constant term: autocovariances of the differenced series are
//! taken around zero.

use crate::error::{ForecastError, Result};
use crate::models::{ForecastModel, ForecastResult, TrainedForecastModel};

/// Prediction error variance below this fraction of the lag-0 autocovariance stops the recursion.
const RECURSION_TOLERANCE: f64 = 1e-12;

/// Largest supported AR order
pub const MAX_AR_ORDER: usize = 10;
/// Largest supported differencing order
pub const MAX_DIFFERENCING: usize = 2;

/// ARIMA model (AutoRegressive Integrated Moving Average)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArimaModel {
    /// Name of the model
    name: String,
    /// AR order (p)
    p: usize,
    /// Differencing order (d)
    d: usize,
    /// MA order (q)
    q: usize,
}

/// Trained ARIMA model
#[derive(Debug, Clone)]
pub struct TrainedArimaModel {
    /// Name of the model
    name: String,
    /// Differencing order (d)
    d: usize,
    /// Fitted AR coefficients, lag 1 first
    ar_coefficients: Vec<f64>,
    /// Innovation variance of the fitted AR process
    sigma2: f64,
    /// Last value of the series at each differencing level, level 0 first
    anchors: Vec<f64>,
    /// Tail of the fully differenced series, at most `p` values
    recent: Vec<f64>,
}

impl ArimaModel {
    /// Create a new ARIMA model.
    ///
    /// Moving-average terms are not estimated, so `q` must be zero.
    pub fn new(p: usize, d: usize, q: usize) -> Result<Self> {
        if p > MAX_AR_ORDER {
            return Err(ForecastError::ValidationError(format!(
                "AR order must be <= {}, got {}",
                MAX_AR_ORDER, p
            )));
        }
        if d > MAX_DIFFERENCING {
            return Err(ForecastError::ValidationError(format!(
                "Differencing order must be <= {}, got {}",
                MAX_DIFFERENCING, d
            )));
        }
        if q != 0 {
            return Err(ForecastError::ValidationError(
                "Moving-average terms are not supported".to_string(),
            ));
        }

        Ok(Self {
            name: format!("ARIMA({},{},{})", p, d, q),
            p,
            d,
            q,
        })
    }

    /// The (p, d, q) order of the model
    pub fn order(&self) -> (usize, usize, usize) {
        (self.p, self.d, self.q)
    }

    /// Minimum number of observations needed to fit the model
    pub fn min_observations(&self) -> usize {
        self.p + self.d + 1
    }
}

impl ForecastModel for ArimaModel {
    type Trained = TrainedArimaModel;

    fn train(&self, series: &[f64]) -> Result<TrainedArimaModel> {
        if series.iter().any(|v| !v.is_finite()) {
            return Err(ForecastError::model_fit("series contains non-finite values"));
        }
        if series.len() < self.min_observations() {
            return Err(ForecastError::model_fit(format!(
                "{} needs at least {} observations, got {}",
                self.name,
                self.min_observations(),
                series.len()
            )));
        }

        let mut anchors = Vec::with_capacity(self.d);
        let mut differenced = series.to_vec();
        for _ in 0..self.d {
            // Non-empty: length checked above.
            anchors.push(differenced[differenced.len() - 1]);
            differenced = difference(&differenced);
        }

        let acov = autocovariances(&differenced, self.p);
        if acov[0] <= f64::EPSILON {
            return Err(ForecastError::model_fit(
                "series is constant after differencing",
            ));
        }

        let (ar_coefficients, sigma2) = levinson_durbin(&acov, self.p)?;
        let recent = differenced[differenced.len().saturating_sub(self.p)..].to_vec();

        tracing::debug!(
            model = %self.name,
            coefficients = ?ar_coefficients,
            sigma2,
            observations = series.len(),
            "fitted ARIMA model"
        );

        Ok(TrainedArimaModel {
            name: self.name.clone(),
            d: self.d,
            ar_coefficients,
            sigma2,
            anchors,
            recent,
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl TrainedArimaModel {
    /// Fitted AR coefficients, lag 1 first
    pub fn ar_coefficients(&self) -> &[f64] {
        &self.ar_coefficients
    }

    /// Innovation variance of the fitted AR process
    pub fn sigma2(&self) -> f64 {
        self.sigma2
    }

    /// Recursive AR forecast of the differenced series
    fn forecast_differenced(&self, horizon: usize) -> Vec<f64> {
        let p = self.ar_coefficients.len();
        let mut history = self.recent.clone();
        let mut forecasts = Vec::with_capacity(horizon);

        for _ in 0..horizon {
            let forecast: f64 = self
                .ar_coefficients
                .iter()
                .enumerate()
                .take(p.min(history.len()))
                .map(|(lag, coef)| coef * history[history.len() - 1 - lag])
                .sum();
            history.push(forecast);
            forecasts.push(forecast);
        }

        forecasts
    }
}

impl TrainedForecastModel for TrainedArimaModel {
    fn forecast(&self, horizon: usize) -> Result<ForecastResult> {
        let mut values = self.forecast_differenced(horizon);

        // Integrate back up one differencing level at a time.
        for anchor in self.anchors.iter().rev() {
            let mut level = *anchor;
            for value in values.iter_mut() {
                level += *value;
                *value = level;
            }
        }

        if values.iter().any(|v| !v.is_finite()) {
            return Err(ForecastError::model_fit("forecast diverged to non-finite values"));
        }

        ForecastResult::new(values, horizon)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// First difference of a series
fn difference(series: &[f64]) -> Vec<f64> {
    series.windows(2).map(|w| w[1] - w[0]).collect()
}

/// Biased autocovariances around zero for lags `0..=max_lag`
fn autocovariances(series: &[f64], max_lag: usize) -> Vec<f64> {
    let n = series.len() as f64;
    (0..=max_lag)
        .map(|lag| {
            if lag >= series.len() {
                return 0.0;
            }
            series[lag..]
                .iter()
                .zip(series.iter())
                .map(|(a, b)| a * b)
                .sum::<f64>()
                / n
        })
        .collect()
}

/// Solve the Yule-Walker equations for an AR(p) process.
///
/// Returns the coefficients (lag 1 first) and the innovation variance.
fn levinson_durbin(acov: &[f64], p: usize) -> Result<(Vec<f64>, f64)> {
    let mut phi = vec![0.0; p];
    let mut error = acov[0];

    for k in 0..p {
        if error <= RECURSION_TOLERANCE * acov[0] {
            // The lower-order fit is already exact; higher lags stay at zero.
            break;
        }

        let mut acc = acov[k + 1];
        for j in 0..k {
            acc -= phi[j] * acov[k - j];
        }
        let reflection = acc / error;

        let previous = phi.clone();
        phi[k] = reflection;
        for j in 0..k {
            phi[j] = previous[j] - reflection * previous[k - 1 - j];
        }
        error *= 1.0 - reflection * reflection;
    }

    if phi.iter().any(|c| !c.is_finite()) || !error.is_finite() {
        return Err(ForecastError::model_fit(
            "Yule-Walker solution produced non-finite coefficients",
        ));
    }

    Ok((phi, error.max(0.0)))
}
