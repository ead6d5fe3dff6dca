use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application error types.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    /// Price/kline fetch error or timeout. Retried on the next scheduled
    /// tick, never surfaced through the read façade.
    #[error("transient source failure: {0}")]
    TransientSource(String),

    /// A computation was asked to run against state it must never see
    /// (e.g. resolving an outcome for a signal that is not closed).
    /// Not retried; the affected signal is flagged for manual review.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("storage failure: {0}")]
    Storage(String),
}

impl From<rusqlite::Error> for AppError {
    fn from(e: rusqlite::Error) -> Self {
        AppError::Storage(e.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        AppError::TransientSource(e.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::TransientSource(e.to_string())
    }
}

impl AppError {
    /// Whether a retry on the next scheduled interval may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::TransientSource(_))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::TransientSource(msg) => (StatusCode::BAD_GATEWAY, msg.clone()),
            AppError::InvariantViolation(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            AppError::Storage(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        // Same envelope shape as successful responses.
        let body = Json(json!({
            "code": status.as_u16(),
            "message": message,
            "data": null,
            "timestamp": chrono::Utc::now().timestamp_millis(),
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
