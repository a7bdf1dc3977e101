//! Attempt submission and management
//!
//! POST /attempts, GET /attempts, POST /attempts/:id/toggle-public

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::Serialize;
use uuid::Uuid;

use super::CallerId;
use crate::error::ApiResult;
use crate::models::{Attempt, AttemptPage, ListAttemptsQuery, SubmitAttempt};
use crate::AppState;

/// POST /attempts/:id/toggle-public response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TogglePublicResponse {
    pub id: Uuid,
    pub is_public: bool,
}

/// POST /attempts
///
/// Accepts the attempt and queues it for scoring. Returns 201 with the
/// pending attempt; poll `/score/status/:id` for the result.
pub async fn submit_attempt(
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
    Json(request): Json<SubmitAttempt>,
) -> ApiResult<(StatusCode, Json<Attempt>)> {
    let attempt = state.pipeline.submit(&user_id, request).await?;
    Ok((StatusCode::CREATED, Json(attempt)))
}

/// GET /attempts?questionId=&page=&pageSize=
pub async fn list_attempts(
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
    Query(query): Query<ListAttemptsQuery>,
) -> ApiResult<Json<AttemptPage>> {
    Ok(Json(state.pipeline.list_attempts(&user_id, &query).await?))
}

/// POST /attempts/:id/toggle-public
pub async fn toggle_public(
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<TogglePublicResponse>> {
    let is_public = state.pipeline.toggle_public(&user_id, id).await?;
    Ok(Json(TogglePublicResponse { id, is_public }))
}

pub fn attempt_routes() -> Router<AppState> {
    Router::new()
        .route("/attempts", post(submit_attempt).get(list_attempts))
        .route("/attempts/:id/toggle-public", post(toggle_public))
}
