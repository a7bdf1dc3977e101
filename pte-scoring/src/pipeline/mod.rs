//! Scoring Pipeline Orchestrator
//!
//! Decouples submission from scoring latency:
//!
//! ```text
//! ingest --ScoringRequested--> worker --ScoringCompleted--> persistence --> progress sync
//!                                     \--ScoringFailed----> failure recorder
//! sweep (interval) --ScoringRequested--^
//! ```
//!
//! Events travel over the in-process `EventBus` with at-most-once delivery.
//! The sweep is the only retry path, and the persistence step is idempotent
//! so duplicate requests for one attempt are harmless.

pub mod ingest;
pub mod jobs;
pub mod persist;
pub mod sweep;
pub mod worker;

use chrono::Duration as ChronoDuration;
use pte_common::events::{EventBus, PteEvent};
use pte_common::time::now;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::credits::CreditManager;
use crate::db::attempts;
use crate::error::{ScoringError, ScoringResult};
use crate::models::{AttemptPage, ListAttemptsQuery, PollStatus, ScoringStatus};
use crate::progress::ProgressAggregator;
use crate::scoring::ScoringEngine;
use jobs::{JobStatus, JobStore};
use pte_common::models::AttemptStatus;

/// Runtime pipeline settings
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub sweep_interval: Duration,
    pub sweep_batch_size: u32,
    pub visibility_timeout: ChronoDuration,
    pub max_scoring_attempts: Option<u32>,
    pub hourly_submission_limit: u32,
    pub job_ttl: ChronoDuration,
    pub max_lock_wait_ms: u64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from(&pte_common::config::PipelineConfig::default())
    }
}

impl From<&pte_common::config::PipelineConfig> for PipelineSettings {
    fn from(config: &pte_common::config::PipelineConfig) -> Self {
        Self {
            sweep_interval: Duration::from_secs(config.sweep_interval_secs),
            sweep_batch_size: config.sweep_batch_size,
            visibility_timeout: ChronoDuration::seconds(config.visibility_timeout_secs as i64),
            max_scoring_attempts: config.max_scoring_attempts,
            hourly_submission_limit: config.hourly_submission_limit,
            job_ttl: ChronoDuration::seconds(config.job_ttl_secs as i64),
            max_lock_wait_ms: crate::utils::db_retry::DEFAULT_MAX_LOCK_WAIT_MS,
        }
    }
}

/// Shared handle to every pipeline collaborator
#[derive(Clone)]
pub struct ScoringPipeline {
    pub(crate) pool: SqlitePool,
    pub(crate) event_bus: EventBus,
    pub(crate) engine: ScoringEngine,
    pub(crate) credits: CreditManager,
    pub(crate) progress: ProgressAggregator,
    pub(crate) jobs: JobStore,
    pub(crate) settings: PipelineSettings,
    /// Most recent background failure, for health diagnostics
    pub(crate) last_error: Arc<RwLock<Option<String>>>,
}

/// Background tasks started by [`ScoringPipeline::start`]
pub struct PipelineTasks {
    handles: Vec<JoinHandle<()>>,
}

impl PipelineTasks {
    /// Stop every task
    pub fn abort(&self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}

impl ScoringPipeline {
    pub fn new(
        pool: SqlitePool,
        event_bus: EventBus,
        engine: ScoringEngine,
        credits: CreditManager,
        progress: ProgressAggregator,
        settings: PipelineSettings,
    ) -> Self {
        let jobs = JobStore::new(settings.job_ttl);
        Self {
            pool,
            event_bus,
            engine,
            credits,
            progress,
            jobs,
            settings,
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    pub fn jobs(&self) -> &JobStore {
        &self.jobs
    }

    pub fn engine(&self) -> &ScoringEngine {
        &self.engine
    }

    pub fn credits(&self) -> &CreditManager {
        &self.credits
    }

    pub fn progress(&self) -> &ProgressAggregator {
        &self.progress
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn last_error(&self) -> Arc<RwLock<Option<String>>> {
        Arc::clone(&self.last_error)
    }

    pub(crate) async fn note_error(&self, message: String) {
        *self.last_error.write().await = Some(message);
    }

    /// Subscribe every step, then spawn the loops
    ///
    /// Subscriptions are taken before this returns, so events emitted
    /// afterwards are not missed.
    pub fn start(&self) -> PipelineTasks {
        let worker_rx = self.event_bus.subscribe();
        let persist_rx = self.event_bus.subscribe();
        let failure_rx = self.event_bus.subscribe();

        let handles = vec![
            tokio::spawn(worker::run_worker_loop(self.clone(), worker_rx)),
            tokio::spawn(persist::run_persistence_loop(self.clone(), persist_rx)),
            tokio::spawn(persist::run_failure_loop(self.clone(), failure_rx)),
            tokio::spawn(sweep::run_sweep_loop(self.clone())),
        ];

        tracing::info!(
            sweep_interval_secs = self.settings.sweep_interval.as_secs(),
            sweep_batch_size = self.settings.sweep_batch_size,
            oracle = self.engine.oracle_name(),
            "Scoring pipeline started"
        );

        PipelineTasks { handles }
    }

    /// Status polling boundary
    ///
    /// A scored attempt row wins over any job entry; otherwise the job entry
    /// (if unexpired) reports in-flight progress, falling back to the row.
    pub async fn scoring_status(&self, user_id: &str, attempt_id: Uuid) -> ScoringResult<ScoringStatus> {
        let now = now();
        let attempt = attempts::get_attempt(&self.pool, attempt_id)
            .await?
            .filter(|a| a.user_id == user_id)
            .ok_or_else(|| ScoringError::NotFound(format!("attempt {}", attempt_id)))?;
        let job = self.jobs.get(attempt_id, now).await;

        if attempt.status == AttemptStatus::Scored {
            return Ok(ScoringStatus {
                attempt_id,
                status: PollStatus::Completed,
                scores: attempt.scores,
                started_at: job.as_ref().map(|j| j.started_at),
                completed_at: attempt.scored_at,
                error: None,
            });
        }

        if let Some(job) = job {
            let status = match job.status {
                JobStatus::Processing => PollStatus::Processing,
                JobStatus::Completed => PollStatus::Completed,
                JobStatus::Failed => PollStatus::Failed,
            };
            return Ok(ScoringStatus {
                attempt_id,
                status,
                scores: job.scores,
                started_at: Some(job.started_at),
                completed_at: job.completed_at,
                error: job.error,
            });
        }

        let status = match attempt.status {
            AttemptStatus::Pending => PollStatus::Pending,
            AttemptStatus::Processing => PollStatus::Processing,
            AttemptStatus::Failed => PollStatus::Failed,
            AttemptStatus::Scored => PollStatus::Completed,
        };
        Ok(ScoringStatus {
            attempt_id,
            status,
            scores: None,
            started_at: None,
            completed_at: None,
            error: attempt.last_error,
        })
    }

    /// A user's attempts, newest first
    pub async fn list_attempts(&self, user_id: &str, query: &ListAttemptsQuery) -> ScoringResult<AttemptPage> {
        let page_size = query.page_size();
        let (attempts, total) = attempts::list_for_user(
            &self.pool,
            user_id,
            query.question_id.as_deref(),
            page_size,
            query.offset(),
        )
        .await?;

        Ok(AttemptPage {
            attempts,
            page: query.page(),
            page_size,
            total,
        })
    }

    /// Flip visibility of an attempt the user owns; returns the new value
    pub async fn toggle_public(&self, user_id: &str, attempt_id: Uuid) -> ScoringResult<bool> {
        attempts::toggle_public(&self.pool, attempt_id, user_id)
            .await?
            .ok_or_else(|| ScoringError::NotFound(format!("attempt {}", attempt_id)))
    }
}

/// Receive the next event, skipping over lag
///
/// Returns `None` once the bus is closed.
pub(crate) async fn next_event(rx: &mut broadcast::Receiver<PteEvent>, step: &'static str) -> Option<PteEvent> {
    loop {
        match rx.recv().await {
            Ok(event) => return Some(event),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(step, skipped, "Pipeline subscriber lagged; sweep will recover skipped work");
            }
            Err(broadcast::error::RecvError::Closed) => {
                tracing::debug!(step, "Event bus closed, stopping");
                return None;
            }
        }
    }
}
