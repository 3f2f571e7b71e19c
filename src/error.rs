// src/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// Global Application Error Enum.
/// Centralizes error handling and mapping to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    // 500 Internal Server Error
    InternalServerError(String),

    // 400 Bad Request
    BadRequest(String),

    // 401 Unauthorized
    AuthError(String),

    // 404 Not Found
    NotFound(String),

    /// No discovered database contains this test id.
    TestNotFound(i64),

    /// Every candidate database failed to open or answer the probe.
    DatabaseUnavailable(String),

    /// The attempt has no bound database, or the bound file is gone.
    SessionExpired,

    /// Review filter other than `correct`, `incorrect` or `all`.
    InvalidFilter(String),

    /// Writing the submission's response records failed. Safe to retry.
    PersistenceFailure(String),

    /// The attempt was already scored; it has to be started again first.
    AlreadySubmitted(i64),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::TestNotFound(id) => write!(f, "Test ID {} not found", id),
            AppError::SessionExpired => write!(f, "Test session expired"),
            AppError::InvalidFilter(filter) => write!(f, "Invalid filter '{}'", filter),
            AppError::AlreadySubmitted(id) => write!(f, "Test ID {} already submitted", id),
            other => write!(f, "{:?}", other),
        }
    }
}

impl std::error::Error for AppError {}

/// Implements `IntoResponse` for `AppError`.
/// Converts the error into a JSON response with appropriate HTTP status code.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::AuthError(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::TestNotFound(id) => {
                (StatusCode::NOT_FOUND, format!("Test ID {} not found", id))
            }
            AppError::DatabaseUnavailable(msg) => {
                tracing::error!("Database unavailable: {}", msg);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Test database unavailable".to_string(),
                )
            }
            AppError::SessionExpired => {
                (StatusCode::NOT_FOUND, "Test session expired".to_string())
            }
            AppError::InvalidFilter(filter) => {
                (StatusCode::NOT_FOUND, format!("Invalid filter '{}'", filter))
            }
            AppError::PersistenceFailure(msg) => {
                tracing::error!("Failed to persist submission: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Submission could not be saved, please retry".to_string(),
                )
            }
            AppError::AlreadySubmitted(id) => (
                StatusCode::CONFLICT,
                format!("Test ID {} already submitted", id),
            ),
        };
        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Converts `sqlx::Error` into `AppError::InternalServerError`.
/// Allows using `?` operator on database queries.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::InternalServerError(err.to_string())
    }
}
