//! Credit status and usage
//!
//! GET /credits, GET /credits/usage

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::CallerId;
use crate::credits::{status_message, CreditStatus, UsageStats};
use crate::error::ApiResult;
use crate::AppState;

const DEFAULT_USAGE_DAYS: u32 = 30;
const MAX_USAGE_DAYS: u32 = 365;

#[derive(Debug, Serialize)]
pub struct CreditsResponse {
    #[serde(flatten)]
    pub status: CreditStatus,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct UsageQuery {
    pub days: Option<u32>,
}

/// GET /credits
pub async fn get_credits(State(state): State<AppState>, CallerId(user_id): CallerId) -> ApiResult<Json<CreditsResponse>> {
    let status = state.credits.status(&user_id).await?;
    let message = status_message(&status);
    Ok(Json(CreditsResponse { status, message }))
}

/// GET /credits/usage?days=N
pub async fn get_usage(
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
    Query(query): Query<UsageQuery>,
) -> ApiResult<Json<UsageStats>> {
    let days = query.days.unwrap_or(DEFAULT_USAGE_DAYS).clamp(1, MAX_USAGE_DAYS);
    Ok(Json(state.credits.usage_stats(&user_id, days).await?))
}

pub fn credit_routes() -> Router<AppState> {
    Router::new()
        .route("/credits", get(get_credits))
        .route("/credits/usage", get(get_usage))
}
