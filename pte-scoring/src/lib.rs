//! pte-scoring library interface for testing
//!
//! Exposes public APIs for integration testing

pub mod api;
pub mod credits;
pub mod db;
pub mod error;
pub mod models;
pub mod oracle;
pub mod pipeline;
pub mod progress;
pub mod scoring;
pub mod utils;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use pte_common::config::TomlConfig;
use pte_common::events::EventBus;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::credits::{Allotment, CreditManager};
use crate::oracle::AssessmentOracle;
use crate::pipeline::{PipelineSettings, ScoringPipeline};
use crate::progress::ProgressAggregator;
use crate::scoring::ScoringEngine;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub pipeline: ScoringPipeline,
    pub credits: CreditManager,
    pub progress: ProgressAggregator,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last background failure, shared with the pipeline
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(pipeline: ScoringPipeline) -> Self {
        Self {
            credits: pipeline.credits.clone(),
            progress: pipeline.progress.clone(),
            last_error: pipeline.last_error(),
            pipeline,
            startup_time: Utc::now(),
        }
    }
}

/// Wire the engine, credit manager and progress aggregator into a pipeline
pub fn build_pipeline(
    pool: SqlitePool,
    event_bus: EventBus,
    oracle: Arc<dyn AssessmentOracle>,
    config: &TomlConfig,
) -> ScoringPipeline {
    let engine = ScoringEngine::new(oracle, Duration::from_millis(config.oracle.timeout_ms));
    let credits = CreditManager::new(
        pool.clone(),
        Allotment::from_db(config.credits.default_daily_allotment),
    );
    let progress = ProgressAggregator::new(pool.clone(), event_bus.clone());

    ScoringPipeline::new(
        pool,
        event_bus,
        engine,
        credits,
        progress,
        PipelineSettings::from(&config.pipeline),
    )
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::attempt_routes())
        .merge(api::scoring_routes())
        .merge(api::credit_routes())
        .merge(api::progress_routes())
        .merge(api::health_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
