use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::constants::{MSG_FORBIDDEN, MSG_TOO_MANY_REQUESTS, MSG_UNAUTHENTICATED};
use crate::routes::validation::ValidationErrors;

/// Application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Task join error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),

    #[error("Password hashing error: {0}")]
    PasswordHash(String),

    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("Unauthenticated")]
    Unauthenticated,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Forbidden")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Constraint violation: {0}")]
    Conflict(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        AppError::Validation(errors)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidInput(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        match rejection {
            // An id that does not parse can never name a stored record
            PathRejection::FailedToDeserializePathParams(_) => AppError::NotFound("Resource"),
            other => AppError::InvalidInput(other.body_text()),
        }
    }
}

/// Implement IntoResponse to convert AppError into HTTP responses
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Database(ref e) => {
                tracing::error!("Database error: {:?}", e);
                internal_error()
            }
            AppError::Serialization(ref e) => {
                tracing::error!("Serialization error: {:?}", e);
                internal_error()
            }
            AppError::TaskJoin(ref e) => {
                tracing::error!("Task join error: {:?}", e);
                internal_error()
            }
            AppError::PasswordHash(ref e) => {
                tracing::error!("Password hashing error: {}", e);
                internal_error()
            }
            AppError::Validation(errors) => {
                let message = errors
                    .first_message()
                    .unwrap_or("The given data was invalid.")
                    .to_string();
                let body = Json(json!({
                    "message": message,
                    "errors": errors,
                }));
                return (StatusCode::UNPROCESSABLE_ENTITY, body).into_response();
            }
            AppError::Unauthenticated => (StatusCode::UNAUTHORIZED, MSG_UNAUTHENTICATED.to_string()),
            AppError::InvalidCredentials => {
                (StatusCode::UNAUTHORIZED, "Invalid credentials".to_string())
            }
            AppError::Forbidden => (StatusCode::FORBIDDEN, MSG_FORBIDDEN.to_string()),
            AppError::NotFound(resource) => {
                (StatusCode::NOT_FOUND, format!("{} not found", resource))
            }
            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::RateLimitExceeded => (
                StatusCode::TOO_MANY_REQUESTS,
                MSG_TOO_MANY_REQUESTS.to_string(),
            ),
        };

        let body = Json(json!({
            "message": message
        }));

        (status, body).into_response()
    }
}

fn internal_error() -> (StatusCode, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error".to_string(),
    )
}

/// Result type alias for application results
pub type Result<T> = std::result::Result<T, AppError>;
