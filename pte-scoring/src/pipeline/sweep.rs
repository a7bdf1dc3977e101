//! Periodic sweep
//!
//! The only retry mechanism: every interval, re-request scoring for a
//! bounded batch of attempts that are not `scored` and have not been touched
//! within the visibility timeout.

use chrono::{DateTime, Utc};
use pte_common::events::PteEvent;
use pte_common::time::now;
use pte_common::Result;
use tokio::time::{interval, MissedTickBehavior};

use super::ingest::scoring_request;
use super::ScoringPipeline;
use crate::db::attempts;

/// Origin tag for requests published by the sweep
pub const ORIGIN_SWEEP: &str = "sweep";

pub async fn run_sweep_loop(pipeline: ScoringPipeline) {
    let mut ticker = interval(pipeline.settings.sweep_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        match pipeline.run_sweep_once().await {
            Ok(0) => tracing::debug!("Sweep found no unscored attempts"),
            Ok(count) => tracing::info!(count, "Sweep re-requested scoring"),
            Err(e) => {
                tracing::error!(error = %e, "Sweep failed");
                pipeline.note_error(format!("sweep: {}", e)).await;
            }
        }
    }
}

impl ScoringPipeline {
    pub async fn run_sweep_once(&self) -> Result<usize> {
        self.run_sweep_at(now()).await
    }

    /// One sweep pass as of `now`; returns how many requests were published
    pub async fn run_sweep_at(&self, now: DateTime<Utc>) -> Result<usize> {
        let purged = self.jobs.purge_expired(now).await;
        if purged > 0 {
            tracing::debug!(purged, "Expired scoring jobs purged");
        }

        let stale_before = now - self.settings.visibility_timeout;
        let batch = attempts::find_unscored(
            &self.pool,
            self.settings.sweep_batch_size,
            stale_before,
            self.settings.max_scoring_attempts,
        )
        .await?;

        for attempt in &batch {
            tracing::debug!(
                attempt_id = %attempt.id,
                status = %attempt.status,
                scoring_attempts = attempt.scoring_attempts,
                "Sweep re-requesting scoring"
            );
            self.event_bus.emit_lossy(PteEvent::ScoringRequested {
                request: scoring_request(attempt),
                origin: ORIGIN_SWEEP.to_string(),
                timestamp: now,
            });
        }

        Ok(batch.len())
    }
}
