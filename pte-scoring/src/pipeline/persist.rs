//! Persistence step and failure recorder
//!
//! Score writes are last-write-wins per attempt. Progress is synced only on
//! the first transition to `scored`, so duplicate requests never double
//! count. A write that fails leaves the attempt unscored for the sweep.

use chrono::{DateTime, Utc};
use pte_common::events::PteEvent;
use pte_common::models::{ScoreResult, Skill};
use pte_common::time::now;
use pte_common::Result;
use tokio::sync::broadcast;
use uuid::Uuid;

use super::{next_event, ScoringPipeline};
use crate::db::attempts::{self, SaveOutcome};
use crate::utils::retry_on_lock;

pub async fn run_persistence_loop(pipeline: ScoringPipeline, mut rx: broadcast::Receiver<PteEvent>) {
    tracing::debug!("Persistence step started");

    while let Some(event) = next_event(&mut rx, "persistence").await {
        if let PteEvent::ScoringCompleted { attempt_id, scores, .. } = event {
            if let Err(e) = pipeline.persist_scores(attempt_id, &scores).await {
                tracing::error!(
                    attempt_id = %attempt_id,
                    error = %e,
                    "Failed to persist scores; attempt left for the sweep"
                );
                pipeline.note_error(format!("persist {}: {}", attempt_id, e)).await;
            }
        }
    }
}

pub async fn run_failure_loop(pipeline: ScoringPipeline, mut rx: broadcast::Receiver<PteEvent>) {
    tracing::debug!("Failure recorder started");

    while let Some(event) = next_event(&mut rx, "failure-recorder").await {
        if let PteEvent::ScoringFailed { attempt_id, error, .. } = event {
            if let Err(e) = pipeline.record_failure(attempt_id, &error).await {
                tracing::error!(attempt_id = %attempt_id, error = %e, "Failed to record scoring failure");
                pipeline.note_error(format!("record failure {}: {}", attempt_id, e)).await;
            }
        }
    }
}

impl ScoringPipeline {
    pub async fn persist_scores(&self, attempt_id: Uuid, scores: &ScoreResult) -> Result<SaveOutcome> {
        self.persist_scores_at(attempt_id, scores, now()).await
    }

    /// Write scores and, on first scoring only, sync progress
    pub async fn persist_scores_at(
        &self,
        attempt_id: Uuid,
        scores: &ScoreResult,
        now: DateTime<Utc>,
    ) -> Result<SaveOutcome> {
        let outcome = retry_on_lock("save_scores", self.settings.max_lock_wait_ms, || {
            attempts::save_scores(&self.pool, attempt_id, scores, now)
        })
        .await?;

        match outcome {
            SaveOutcome::FirstScore => {
                tracing::info!(attempt_id = %attempt_id, total = scores.total, "Scores persisted");
                self.sync_progress(attempt_id, scores.total, now).await;
            }
            SaveOutcome::Overwritten => {
                tracing::debug!(attempt_id = %attempt_id, "Scores overwritten for already-scored attempt");
            }
            SaveOutcome::NotFound => {
                tracing::warn!(attempt_id = %attempt_id, "Scores completed for unknown attempt; dropped");
            }
        }

        Ok(outcome)
    }

    async fn sync_progress(&self, attempt_id: Uuid, total: u8, now: DateTime<Utc>) {
        let attempt = match attempts::get_attempt(&self.pool, attempt_id).await {
            Ok(Some(attempt)) => attempt,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!(attempt_id = %attempt_id, error = %e, "Could not load attempt for progress sync");
                return;
            }
        };

        let time_spent_secs = attempt.duration_ms.div_ceil(1000);
        self.progress
            .sync_after_attempt_at(
                &attempt.user_id,
                Skill::Speaking,
                u32::from(total),
                Some(time_spent_secs),
                now,
            )
            .await;
    }

    /// Mark the attempt failed (never overwriting `scored`)
    pub async fn record_failure(&self, attempt_id: Uuid, error: &str) -> Result<bool> {
        let at = now();
        let updated = retry_on_lock("mark_failed", self.settings.max_lock_wait_ms, || {
            attempts::mark_failed(&self.pool, attempt_id, error, at)
        })
        .await?;

        if updated {
            tracing::warn!(attempt_id = %attempt_id, error, "Attempt marked failed");
        } else {
            tracing::debug!(attempt_id = %attempt_id, "Failure ignored: attempt missing or already scored");
        }
        Ok(updated)
    }
}
