//! Scoring status polling
//!
//! GET /score/status/:attempt_id

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use uuid::Uuid;

use super::CallerId;
use crate::error::ApiResult;
use crate::models::ScoringStatus;
use crate::AppState;

/// GET /score/status/:attempt_id
///
/// A scored attempt always reports `completed` with its stored scores, even
/// after the in-memory job entry has expired.
pub async fn get_scoring_status(
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
    Path(attempt_id): Path<Uuid>,
) -> ApiResult<Json<ScoringStatus>> {
    Ok(Json(state.pipeline.scoring_status(&user_id, attempt_id).await?))
}

pub fn scoring_routes() -> Router<AppState> {
    Router::new().route("/score/status/:attempt_id", get(get_scoring_status))
}
