//! Error types shared by every Flit subsystem.
//!
//! Mirrors the error-kind taxonomy of the timeline delivery pipeline:
//! components return a typed `FlitError`; the HTTP edge (`flit-api`) maps
//! it to a status code, and queue consumers map it to Ack/Nack.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, FlitError>;

#[derive(Error, Debug)]
pub enum FlitError {
    #[error("validation failed: {0}")]
    ValidationFailed(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    /// Backing store unreachable; callers should retry/Nack.
    #[error("transient failure: {0}")]
    Transient(String),

    /// The work item will never succeed; dead-letter on next redelivery.
    #[error("permanent failure: {0}")]
    Permanent(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),
}

impl FlitError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, FlitError::Transient(_))
    }
}

impl From<sqlx::Error> for FlitError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => FlitError::NotFound("row not found".into()),
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                FlitError::Conflict(db_err.to_string())
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => {
                FlitError::Transient(err.to_string())
            }
            other => FlitError::Transient(other.to_string()),
        }
    }
}

impl From<redis::RedisError> for FlitError {
    fn from(err: redis::RedisError) -> Self {
        FlitError::Transient(format!("redis: {err}"))
    }
}

impl From<serde_json::Error> for FlitError {
    fn from(err: serde_json::Error) -> Self {
        FlitError::Internal(format!("serialization: {err}"))
    }
}

impl ResponseError for FlitError {
    fn status_code(&self) -> StatusCode {
        match self {
            FlitError::ValidationFailed(_) => StatusCode::BAD_REQUEST,
            FlitError::Unauthorized => StatusCode::UNAUTHORIZED,
            FlitError::Forbidden(_) => StatusCode::FORBIDDEN,
            FlitError::NotFound(_) => StatusCode::NOT_FOUND,
            FlitError::Conflict(_) => StatusCode::CONFLICT,
            FlitError::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
            FlitError::Permanent(_) | FlitError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            FlitError::Cancelled => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        HttpResponse::build(status).json(serde_json::json!({
            "error": self.to_string(),
            "code": status.as_u16(),
        }))
    }
}
