//! Error types for pte-scoring
//!
//! `ScoringError` is the pipeline's error taxonomy; `ApiError` maps it onto
//! HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde_json::json;
use thiserror::Error;

/// Errors surfaced synchronously by the pipeline
///
/// Oracle failures never appear here: the Scoring Engine absorbs them.
#[derive(Debug, Error)]
pub enum ScoringError {
    /// Malformed submission, rejected before entering the pipeline
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Daily credit allowance exhausted
    #[error("{reason}")]
    QuotaExceeded {
        /// Credits left today (`None` = unlimited, never raised in practice)
        remaining: Option<u32>,
        resets_at: Option<DateTime<Utc>>,
        reason: String,
    },

    /// Too many submissions in the last hour
    #[error("Rate limit exceeded: max {limit} attempts per hour")]
    RateLimited { limit: u32 },

    #[error("Not found: {0}")]
    NotFound(String),

    /// Storage failure
    #[error("Persistence error: {0}")]
    Persistence(#[from] pte_common::Error),
}

impl From<sqlx::Error> for ScoringError {
    fn from(err: sqlx::Error) -> Self {
        ScoringError::Persistence(pte_common::Error::Database(err))
    }
}

/// Result type for pipeline operations
pub type ScoringResult<T> = Result<T, ScoringError>;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Missing caller identity (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Quota or rate limit hit (429)
    #[error("Too many requests: {message}")]
    TooManyRequests {
        code: &'static str,
        message: String,
        resets_at: Option<DateTime<Utc>>,
    },

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// pte-common error
    #[error("Common error: {0}")]
    Common(#[from] pte_common::Error),
}

impl From<ScoringError> for ApiError {
    fn from(err: ScoringError) -> Self {
        match err {
            ScoringError::Validation(msg) => ApiError::BadRequest(msg),
            ScoringError::NotFound(msg) => ApiError::NotFound(msg),
            ScoringError::QuotaExceeded { resets_at, reason, .. } => ApiError::TooManyRequests {
                code: "QUOTA_EXCEEDED",
                message: reason,
                resets_at,
            },
            err @ ScoringError::RateLimited { .. } => ApiError::TooManyRequests {
                code: "RATE_LIMITED",
                message: err.to_string(),
                resets_at: None,
            },
            ScoringError::Persistence(e) => ApiError::Common(e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut resets_at_field = None;
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg),
            ApiError::TooManyRequests { code, message, resets_at } => {
                resets_at_field = resets_at;
                (StatusCode::TOO_MANY_REQUESTS, code, message)
            }
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
            ApiError::Common(ref err) => {
                tracing::error!(error = %err, "Request failed with storage error");
                (StatusCode::INTERNAL_SERVER_ERROR, "COMMON_ERROR", err.to_string())
            }
        };

        let body = match resets_at_field {
            Some(resets_at) => json!({
                "error": {
                    "code": error_code,
                    "message": message,
                    "resetsAt": resets_at,
                }
            }),
            None => json!({
                "error": {
                    "code": error_code,
                    "message": message,
                }
            }),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
