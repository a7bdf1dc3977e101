//! HTTP API handlers for pte-scoring
//!
//! Every route except `/health` identifies the caller by the `x-user-id`
//! header set by the upstream gateway.

pub mod attempts;
pub mod credits;
pub mod health;
pub mod progress;
pub mod scoring;

pub use attempts::attempt_routes;
pub use credits::credit_routes;
pub use health::health_routes;
pub use progress::progress_routes;
pub use scoring::scoring_routes;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::ApiError;

/// Header carrying the authenticated user id
pub const USER_ID_HEADER: &str = "x-user-id";

/// Caller identity taken from [`USER_ID_HEADER`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerId(pub String);

#[axum::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CallerId {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| CallerId(value.to_string()))
            .ok_or_else(|| ApiError::Unauthorized(format!("missing {} header", USER_ID_HEADER)))
    }
}
