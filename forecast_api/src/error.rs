//! HTTP error responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use covid_forecast::ForecastError;
use serde_json::json;

/// Error returned by the API handlers
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Forecast(#[from] ForecastError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Status code and client-facing message
    fn parts(&self) -> (StatusCode, String) {
        match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Timeout(msg) => (StatusCode::GATEWAY_TIMEOUT, msg.clone()),
            ApiError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".into())
            }
            ApiError::Forecast(err) => match err {
                ForecastError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
                ForecastError::NotFoundError(msg) => (StatusCode::NOT_FOUND, msg.clone()),
                ForecastError::InsufficientDataError(msg) => {
                    (StatusCode::UNPROCESSABLE_ENTITY, msg.clone())
                }
                ForecastError::ModelFitError { variable, reason } => {
                    tracing::error!(variable = %variable, reason = %reason, "model fit failed");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        format!("Failed to fit a forecast model for '{}'", variable),
                    )
                }
                other => {
                    tracing::error!("Forecast storage error: {}", other);
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Failed to store or read the forecast".into(),
                    )
                }
            },
        }
    }

    pub fn status(&self) -> StatusCode {
        self.parts().0
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.parts();

        let body = Json(json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}
