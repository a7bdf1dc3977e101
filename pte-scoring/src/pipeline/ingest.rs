//! Attempt ingestion
//!
//! Validate, rate-limit, reserve a credit, persist as `pending`, then
//! request scoring. Validation and quota failures are returned to the caller;
//! nothing is stored for them.

use chrono::{DateTime, Duration, Utc};
use pte_common::events::{PteEvent, ScoringRequest};
use pte_common::models::{AttemptStatus, SpeakingSubtype};
use pte_common::time::now;
use uuid::Uuid;

use super::ScoringPipeline;
use crate::db::attempts;
use crate::error::{ScoringError, ScoringResult};
use crate::models::{Attempt, AttemptTimings, SubmitAttempt, TimeInterval};
use crate::scoring::metrics::SpeechMetrics;

/// Origin tag for requests published at submission time
pub const ORIGIN_INGESTION: &str = "ingestion";

/// Submission after validation
#[derive(Debug, Clone)]
struct ValidSubmission {
    question_id: String,
    subtype: SpeakingSubtype,
    audio_reference: String,
    transcript: Option<String>,
    reference_text: Option<String>,
    prompt: Option<String>,
    duration_ms: u64,
    timings: AttemptTimings,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn validate_interval(name: &str, interval: Option<&TimeInterval>) -> ScoringResult<()> {
    match interval {
        Some(i) if i.end < i.start => Err(ScoringError::Validation(format!(
            "timings.{} ends before it starts",
            name
        ))),
        _ => Ok(()),
    }
}

/// `audioReference` must be an absolute http(s) URL with a host
fn validate_audio_reference(value: &str) -> ScoringResult<()> {
    let url = reqwest::Url::parse(value.trim())
        .map_err(|e| ScoringError::Validation(format!("audioReference is not a valid URL: {}", e)))?;

    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(ScoringError::Validation(format!(
            "audioReference must be an http(s) URL, got '{}'",
            value
        )));
    }
    Ok(())
}

fn validate(submit: SubmitAttempt) -> ScoringResult<ValidSubmission> {
    let subtype = submit
        .subtype
        .parse::<SpeakingSubtype>()
        .map_err(|_| ScoringError::Validation(format!("Unknown speaking subtype: {}", submit.subtype)))?;

    if submit.question_id.trim().is_empty() {
        return Err(ScoringError::Validation("questionId is required".to_string()));
    }

    validate_audio_reference(&submit.audio_reference)?;
    validate_interval("prep", submit.timings.prep.as_ref())?;
    validate_interval("record", submit.timings.record.as_ref())?;

    Ok(ValidSubmission {
        question_id: submit.question_id.trim().to_string(),
        subtype,
        audio_reference: submit.audio_reference.trim().to_string(),
        transcript: submit.transcript,
        reference_text: non_blank(submit.reference_text),
        prompt: non_blank(submit.prompt),
        duration_ms: submit.duration_ms,
        timings: submit.timings,
    })
}

impl ScoringPipeline {
    pub async fn submit(&self, user_id: &str, submit: SubmitAttempt) -> ScoringResult<Attempt> {
        self.submit_at(user_id, submit, now()).await
    }

    /// Ingest one attempt as of `now`
    ///
    /// The hourly limit is soft: it counts stored attempts before the insert,
    /// so concurrent submissions from one user can overshoot it by the number
    /// in flight. Credits remain the hard gate.
    pub async fn submit_at(&self, user_id: &str, submit: SubmitAttempt, now: DateTime<Utc>) -> ScoringResult<Attempt> {
        let valid = validate(submit)?;

        let limit = self.settings.hourly_submission_limit;
        let recent = attempts::count_since(&self.pool, user_id, now - Duration::hours(1)).await?;
        if recent >= u64::from(limit) {
            tracing::info!(user_id, recent, limit, "Submission rate limited");
            return Err(ScoringError::RateLimited { limit });
        }

        self.credits
            .with_credit_check_at(user_id, valid.subtype.as_str(), now, || {
                self.persist_and_request(user_id, valid, now)
            })
            .await
    }

    async fn persist_and_request(
        &self,
        user_id: &str,
        valid: ValidSubmission,
        now: DateTime<Utc>,
    ) -> ScoringResult<Attempt> {
        let metrics = SpeechMetrics::from_transcript(valid.transcript.as_deref().unwrap_or(""), valid.duration_ms);

        let attempt = Attempt {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            question_id: valid.question_id,
            subtype: valid.subtype,
            audio_reference: valid.audio_reference,
            transcript: valid.transcript,
            reference_text: valid.reference_text,
            prompt: valid.prompt,
            duration_ms: valid.duration_ms,
            words_per_minute: metrics.words_per_minute,
            filler_rate: metrics.filler_rate,
            timings: valid.timings,
            status: AttemptStatus::Pending,
            scores: None,
            scoring_attempts: 0,
            last_error: None,
            scored_at: None,
            is_public: false,
            created_at: now,
            updated_at: now,
        };

        attempts::insert_attempt(&self.pool, &attempt).await?;

        tracing::info!(
            attempt_id = %attempt.id,
            user_id,
            subtype = %attempt.subtype,
            "Attempt accepted"
        );

        self.event_bus.emit_lossy(PteEvent::ScoringRequested {
            request: scoring_request(&attempt),
            origin: ORIGIN_INGESTION.to_string(),
            timestamp: now,
        });

        Ok(attempt)
    }
}

/// Minimal payload needed to (re-)score an attempt
pub fn scoring_request(attempt: &Attempt) -> ScoringRequest {
    ScoringRequest {
        attempt_id: attempt.id,
        user_id: attempt.user_id.clone(),
        subtype: attempt.subtype,
        audio_reference: attempt.audio_reference.clone(),
        transcript: attempt.transcript.clone(),
        reference_text: attempt.reference_text.clone(),
        prompt: attempt.prompt.clone(),
        duration_ms: attempt.duration_ms,
    }
}
