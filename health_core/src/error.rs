//! Application error types and handling

use crate::health::HealthReport;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// At least one dependency failed its check. The full report travels
    /// with the error so the caller can still render every entry.
    #[error("Service unavailable: {}", .0.summary())]
    ServiceUnavailable(Box<HealthReport>),

    #[error("Not found: {0}")]
    NotFound(String),

    /// A request handler panicked.
    #[error("Internal server error: {0}")]
    InternalServerError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl AppError {
    /// Returns the report carried by a `ServiceUnavailable` error.
    pub fn report(&self) -> Option<&HealthReport> {
        match self {
            AppError::ServiceUnavailable(report) => Some(&**report),
            _ => None,
        }
    }

    pub fn into_report(self) -> Option<HealthReport> {
        match self {
            AppError::ServiceUnavailable(report) => Some(*report),
            _ => None,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Configuration(_) | AppError::InternalServerError(_) | AppError::IoError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let error_message = match self {
            AppError::ServiceUnavailable(report) => {
                return (status, Json(*report)).into_response();
            }
            AppError::NotFound(msg) => msg,
            AppError::Configuration(msg) => {
                tracing::error!("Health aggregator misconfigured: {}", msg);
                format!("Configuration error: {}", msg)
            }
            AppError::InternalServerError(detail) => {
                tracing::error!("Request handler panicked: {}", detail);
                "Internal server error".to_string()
            }
            AppError::IoError(err) => {
                tracing::error!("IO error: {:?}", err);
                "Internal server error".to_string()
            }
        };

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

impl From<::config::ConfigError> for AppError {
    fn from(err: ::config::ConfigError) -> Self {
        AppError::Configuration(err.to_string())
    }
}
