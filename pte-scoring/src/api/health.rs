//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "ok", or "degraded" when no oracle is configured
    pub status: String,
    /// Module name ("pte-scoring")
    pub module: String,
    pub version: String,
    /// Seconds since service started
    pub uptime_seconds: u64,
    /// Assessment oracle in use
    pub oracle: String,
    /// Scoring jobs still running
    pub in_flight_jobs: usize,
    /// Most recent background pipeline failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    let uptime_seconds = uptime.num_seconds().max(0) as u64;

    let last_error = state.last_error.read().await.clone();
    let oracle = state.pipeline.engine().oracle_name();
    let status = if oracle == crate::oracle::UnavailableOracle::NAME {
        "degraded"
    } else {
        "ok"
    };

    Json(HealthResponse {
        status: status.to_string(),
        module: "pte-scoring".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds,
        oracle: oracle.to_string(),
        in_flight_jobs: state.pipeline.jobs().in_flight().await,
        last_error,
    })
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
