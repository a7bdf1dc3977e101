//! Scoring worker
//!
//! Subscribes to `ScoringRequested` and scores each attempt in its own task,
//! so one slow oracle call never holds up the loop.

use pte_common::events::{PteEvent, ScoringRequest};
use pte_common::time::now;
use tokio::sync::broadcast;

use super::{next_event, ScoringPipeline};
use crate::db::attempts;
use crate::scoring::{QuestionContext, ScoringInput};

pub async fn run_worker_loop(pipeline: ScoringPipeline, mut rx: broadcast::Receiver<PteEvent>) {
    tracing::debug!("Scoring worker started");

    while let Some(event) = next_event(&mut rx, "worker").await {
        if let PteEvent::ScoringRequested { request, origin, .. } = event {
            tracing::debug!(attempt_id = %request.attempt_id, origin = %origin, "Scoring requested");
            let pipeline = pipeline.clone();
            tokio::spawn(async move {
                pipeline.process_request(request).await;
            });
        }
    }
}

impl ScoringPipeline {
    /// Score one request and publish the outcome
    ///
    /// Never fails: problems become a `ScoringFailed` event.
    pub async fn process_request(&self, request: ScoringRequest) {
        let attempt_id = request.attempt_id;
        let started = now();
        self.jobs.start(attempt_id, started).await;

        match attempts::get_attempt(&self.pool, attempt_id).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                self.publish_failure(attempt_id, "attempt not found".to_string()).await;
                return;
            }
            Err(e) => {
                self.publish_failure(attempt_id, format!("failed to load attempt: {}", e)).await;
                return;
            }
        }

        // False means already scored; rescoring still runs and overwrites
        if let Err(e) = attempts::mark_processing(&self.pool, attempt_id, started).await {
            self.publish_failure(attempt_id, format!("failed to mark processing: {}", e))
                .await;
            return;
        }

        let input = ScoringInput {
            attempt_id,
            subtype: request.subtype,
            question: QuestionContext {
                reference_text: request.reference_text,
                prompt: request.prompt,
            },
            transcript: request.transcript,
            audio_reference: request.audio_reference,
            duration_ms: request.duration_ms,
        };

        let scores = self.engine.score_attempt(&input).await;
        let finished = now();

        tracing::info!(
            attempt_id = %attempt_id,
            total = scores.total,
            source = ?scores.meta.source,
            elapsed_ms = (finished - started).num_milliseconds(),
            "Attempt scored"
        );

        self.jobs.complete(attempt_id, scores.clone(), finished).await;
        self.event_bus.emit_lossy(PteEvent::ScoringCompleted {
            attempt_id,
            scores,
            timestamp: finished,
        });
    }

    async fn publish_failure(&self, attempt_id: uuid::Uuid, error: String) {
        tracing::error!(attempt_id = %attempt_id, error = %error, "Scoring could not run");
        let at = now();
        self.jobs.fail(attempt_id, error.clone(), at).await;
        self.event_bus.emit_lossy(PteEvent::ScoringFailed {
            attempt_id,
            error,
            timestamp: at,
        });
    }
}
