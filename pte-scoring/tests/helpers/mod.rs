//! Test Helper Utilities
//!
//! Shared utilities for testing pte-scoring

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pte_common::config::TomlConfig;
use pte_common::events::EventBus;
use pte_common::models::AttemptStatus;
use pte_scoring::db::attempts;
use pte_scoring::models::{Attempt, AttemptTimings, SubmitAttempt};
use pte_scoring::oracle::{
    AssessmentOracle, OracleAssessment, OracleError, OracleFeedback, OracleRequest,
};
use pte_scoring::pipeline::ScoringPipeline;
use pte_scoring::{build_pipeline, build_router, AppState};
use sqlx::SqlitePool;
use uuid::Uuid;

/// Oracle returning the same assessment every call
pub struct FixedOracle {
    pub pronunciation: f64,
    pub fluency: f64,
    pub content: f64,
    pub calls: AtomicUsize,
}

impl FixedOracle {
    /// Every sub-score lands in band 4, so the total is 72
    pub fn band_four() -> Arc<Self> {
        Arc::new(Self {
            pronunciation: 72.0,
            fluency: 65.0,
            content: 80.0,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AssessmentOracle for FixedOracle {
    fn name(&self) -> &'static str {
        "fixed"
    }

    async fn assess(&self, _request: &OracleRequest) -> Result<OracleAssessment, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(OracleAssessment {
            pronunciation: self.pronunciation,
            fluency: self.fluency,
            content: self.content,
            feedback: OracleFeedback {
                strengths: vec!["Clear delivery".to_string()],
                improvements: vec!["Vary intonation".to_string()],
                detailed_analysis: "Consistent pace throughout.".to_string(),
            },
        })
    }
}

/// Oracle that always fails with an API error
pub struct FailingOracle;

#[async_trait]
impl AssessmentOracle for FailingOracle {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn assess(&self, _request: &OracleRequest) -> Result<OracleAssessment, OracleError> {
        Err(OracleError::Api(503, "service unavailable".to_string()))
    }
}

/// Config with a small allotment and no background sweep noise
pub fn test_config(daily_allotment: i64) -> TomlConfig {
    let mut config = TomlConfig::default();
    config.credits.default_daily_allotment = daily_allotment;
    config.oracle.timeout_ms = 2_000;
    config.pipeline.sweep_interval_secs = 3600;
    config
}

pub struct TestHarness {
    pub pool: SqlitePool,
    pub event_bus: EventBus,
    pub pipeline: ScoringPipeline,
}

/// Pipeline over a fresh in-memory database; loops are not started
pub async fn create_harness(oracle: Arc<dyn AssessmentOracle>, config: &TomlConfig) -> TestHarness {
    let pool = pte_scoring::db::init_memory_database()
        .await
        .expect("Failed to create in-memory database");
    let event_bus = EventBus::new(config.pipeline.event_capacity);
    let pipeline = build_pipeline(pool.clone(), event_bus.clone(), oracle, config);

    TestHarness {
        pool,
        event_bus,
        pipeline,
    }
}

/// Router plus the pipeline behind it (loops not started)
pub async fn create_test_app(config: &TomlConfig) -> (axum::Router, TestHarness) {
    let harness = create_harness(FixedOracle::band_four(), config).await;
    let state = AppState::new(harness.pipeline.clone());
    (build_router(state), harness)
}

pub fn submission(transcript: Option<&str>) -> SubmitAttempt {
    SubmitAttempt {
        question_id: "q-read-1".to_string(),
        subtype: "read_aloud".to_string(),
        audio_reference: "https://cdn.example.com/audio/a1.webm".to_string(),
        transcript: transcript.map(str::to_string),
        reference_text: Some("The quick brown fox jumps over the lazy dog".to_string()),
        prompt: None,
        duration_ms: 6_000,
        timings: AttemptTimings::default(),
    }
}

pub const SAMPLE_TRANSCRIPT: &str = "The quick brown fox jumps over the lazy dog";

/// Poll the attempt row until it reaches `status`
pub async fn wait_for_status(pool: &SqlitePool, id: Uuid, status: AttemptStatus) -> Attempt {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let attempt = attempts::get_attempt(pool, id)
            .await
            .expect("get_attempt failed")
            .expect("attempt missing");
        if attempt.status == status {
            return attempt;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "attempt {} stuck in {:?}, expected {:?}",
            id,
            attempt.status,
            status
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
