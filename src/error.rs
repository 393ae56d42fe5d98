use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Redis(#[from] redis::RedisError),

    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
}

/// Builds the one error envelope shape the service returns everywhere:
/// `{success:false, error, message}`, per the documented HTTP contract.
pub fn error_body(error: &str, message: impl Into<String>) -> serde_json::Value {
    json!({
        "success": false,
        "error": error,
        "message": message.into(),
    })
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "Not found", msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "Validation error", msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "Conflict", msg.clone()),
            AppError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "Rate limited",
                "Rate limit exceeded".to_string(),
            ),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal error",
                    "Internal server error".to_string(),
                )
            }
            AppError::Sqlx(e) => {
                tracing::error!("Store error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal error",
                    "Store error".to_string(),
                )
            }
            AppError::Redis(e) => {
                tracing::error!("Queue substrate error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal error",
                    "Queue substrate error".to_string(),
                )
            }
            AppError::SerdeJson(e) => {
                tracing::error!("Serialization error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal error",
                    "Serialization error".to_string(),
                )
            }
        };

        (status, Json(error_body(error, message))).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
