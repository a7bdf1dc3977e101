//! User progress
//!
//! GET /progress, POST /progress/results

use axum::{extract::State, routing::get, routing::post, Json, Router};

use super::CallerId;
use crate::error::{ApiError, ApiResult};
use crate::models::{ProgressRecord, SkillResultInput};
use crate::scoring::bands::MAX_SCORE;
use crate::AppState;

/// GET /progress
pub async fn get_progress(State(state): State<AppState>, CallerId(user_id): CallerId) -> ApiResult<Json<ProgressRecord>> {
    state
        .progress
        .get(&user_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("no progress recorded for {}", user_id)))
}

/// POST /progress/results
///
/// Records a writing, reading or listening result graded elsewhere and
/// returns the refreshed snapshot.
pub async fn post_result(
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
    Json(input): Json<SkillResultInput>,
) -> ApiResult<Json<ProgressRecord>> {
    if f64::from(input.score) > MAX_SCORE {
        return Err(ApiError::BadRequest(format!(
            "score must be between 0 and {}, got {}",
            MAX_SCORE, input.score
        )));
    }

    state
        .progress
        .record_result(&user_id, input.skill, input.score, input.time_spent_secs)
        .await?;

    state
        .progress
        .get(&user_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::Internal("progress snapshot missing after sync".to_string()))
}

pub fn progress_routes() -> Router<AppState> {
    Router::new()
        .route("/progress", get(get_progress))
        .route("/progress/results", post(post_result))
}
