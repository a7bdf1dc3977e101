//! Scoring Engine
//!
//! Turns a transcript plus timing and question metadata into a normalized
//! `ScoreResult`. The oracle is tried first; any oracle failure (including
//! the call timeout) falls back to closed-form heuristics, so
//! [`ScoringEngine::score_attempt`] always returns a usable score.

pub mod bands;
pub mod feedback;
pub mod heuristics;
pub mod metrics;

use std::sync::Arc;
use std::time::Duration;

use pte_common::models::{Feedback, RawSubScores, ScoreMeta, ScoreResult, ScoreSource, SpeakingSubtype};
use uuid::Uuid;

use crate::oracle::{AssessmentOracle, OracleAssessment, OracleError, OracleRequest};
use bands::{compute_total, descriptor, to_band};
use metrics::{tokenize, SpeechMetrics};

/// Recordings shorter than this are treated as no attempt
pub const MIN_SPEECH_DURATION_MS: u64 = 500;

/// Question metadata the engine may use
#[derive(Debug, Clone, Default)]
pub struct QuestionContext {
    /// Text the candidate should reproduce or the expected answer
    pub reference_text: Option<String>,
    /// Prompt shown to the candidate
    pub prompt: Option<String>,
}

/// Everything needed to score one attempt
#[derive(Debug, Clone)]
pub struct ScoringInput {
    pub attempt_id: Uuid,
    pub subtype: SpeakingSubtype,
    pub question: QuestionContext,
    pub transcript: Option<String>,
    pub audio_reference: String,
    pub duration_ms: u64,
}

/// Oracle-first scorer with heuristic fallback
#[derive(Clone)]
pub struct ScoringEngine {
    oracle: Arc<dyn AssessmentOracle>,
    timeout: Duration,
}

impl ScoringEngine {
    pub fn new(oracle: Arc<dyn AssessmentOracle>, timeout: Duration) -> Self {
        Self { oracle, timeout }
    }

    pub fn oracle_name(&self) -> &'static str {
        self.oracle.name()
    }

    /// Score an attempt; never fails
    pub async fn score_attempt(&self, input: &ScoringInput) -> ScoreResult {
        let transcript = input.transcript.as_deref().unwrap_or("");
        let tokens = tokenize(transcript);
        let metrics = SpeechMetrics::from_tokens(&tokens, input.duration_ms);
        let rubric = feedback::rubric_for(input.subtype);

        if tokens.is_empty() || input.duration_ms < MIN_SPEECH_DURATION_MS {
            tracing::debug!(
                attempt_id = %input.attempt_id,
                duration_ms = input.duration_ms,
                "No speech detected"
            );
            return no_speech_result(rubric, &metrics);
        }

        let request = OracleRequest {
            attempt_id: input.attempt_id,
            subtype: input.subtype,
            transcript: transcript.to_string(),
            reference_text: input.question.reference_text.clone(),
            prompt: input.question.prompt.clone(),
            rubric: rubric.to_string(),
        };

        match self.call_oracle(&request).await {
            Ok(assessment) => oracle_result(assessment, rubric, &metrics),
            Err(err) => {
                tracing::warn!(
                    attempt_id = %input.attempt_id,
                    oracle = self.oracle.name(),
                    error = %err,
                    "Oracle assessment failed, using heuristic scores"
                );
                let raw = heuristics::score(
                    input.subtype,
                    &tokens,
                    &metrics,
                    input.question.reference_text.as_deref(),
                );
                heuristic_result(raw, rubric, &metrics, err.to_string())
            }
        }
    }

    /// Oracle call bounded by the engine timeout
    async fn call_oracle(&self, request: &OracleRequest) -> Result<OracleAssessment, OracleError> {
        let assessment = tokio::time::timeout(self.timeout, self.oracle.assess(request))
            .await
            .map_err(|_| OracleError::Timeout(self.timeout.as_millis() as u64))??;
        assessment.validate()?;
        Ok(assessment)
    }
}

fn meta(metrics: &SpeechMetrics, source: ScoreSource, raw: Option<RawSubScores>) -> ScoreMeta {
    ScoreMeta {
        words_per_minute: metrics.words_per_minute,
        filler_rate: metrics.filler_rate,
        word_count: metrics.word_count,
        source,
        fallback_reason: None,
        raw,
    }
}

/// Band the raw sub-scores and assemble the result
fn banded(raw: RawSubScores, rubric: &str, feedback: Feedback, meta: ScoreMeta) -> ScoreResult {
    let content = to_band(raw.content);
    let pronunciation = to_band(raw.pronunciation);
    let fluency = to_band(raw.fluency);
    let total = compute_total(f64::from(content), f64::from(pronunciation), f64::from(fluency));

    ScoreResult {
        content,
        pronunciation,
        fluency,
        total,
        descriptor: descriptor(total).to_string(),
        rubric: rubric.to_string(),
        feedback,
        meta,
    }
}

fn oracle_result(assessment: OracleAssessment, rubric: &str, metrics: &SpeechMetrics) -> ScoreResult {
    let raw = RawSubScores {
        content: assessment.content,
        pronunciation: assessment.pronunciation,
        fluency: assessment.fluency,
    };
    let mut result = banded(
        raw,
        rubric,
        Feedback::default(),
        meta(metrics, ScoreSource::Oracle, Some(raw)),
    );

    let detailed = assessment.feedback.detailed_analysis.trim();
    result.feedback = Feedback {
        summary: feedback::summary(result.total, metrics.words_per_minute),
        strengths: assessment.feedback.strengths,
        improvements: assessment.feedback.improvements,
        detailed_analysis: (!detailed.is_empty()).then(|| detailed.to_string()),
    };
    result
}

fn heuristic_result(
    raw: RawSubScores,
    rubric: &str,
    metrics: &SpeechMetrics,
    fallback_reason: String,
) -> ScoreResult {
    let mut meta = meta(metrics, ScoreSource::Heuristic, Some(raw));
    meta.fallback_reason = Some(fallback_reason);

    let mut result = banded(raw, rubric, Feedback::default(), meta);
    result.feedback =
        feedback::heuristic_feedback(result.total, metrics.words_per_minute, metrics.filler_rate);
    result
}

fn no_speech_result(rubric: &str, metrics: &SpeechMetrics) -> ScoreResult {
    let raw = RawSubScores {
        content: 0.0,
        pronunciation: 0.0,
        fluency: 0.0,
    };
    banded(
        raw,
        rubric,
        feedback::no_speech_feedback(),
        meta(metrics, ScoreSource::NoSpeech, Some(raw)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::{OracleFeedback, UnavailableOracle};
    use async_trait::async_trait;

    struct FixedOracle(OracleAssessment);

    #[async_trait]
    impl AssessmentOracle for FixedOracle {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn assess(&self, _request: &OracleRequest) -> Result<OracleAssessment, OracleError> {
            Ok(self.0.clone())
        }
    }

    struct SlowOracle;

    #[async_trait]
    impl AssessmentOracle for SlowOracle {
        fn name(&self) -> &'static str {
            "slow"
        }

        async fn assess(&self, _request: &OracleRequest) -> Result<OracleAssessment, OracleError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Err(OracleError::Unavailable("unreachable".to_string()))
        }
    }

    fn input(transcript: &str, duration_ms: u64) -> ScoringInput {
        ScoringInput {
            attempt_id: Uuid::new_v4(),
            subtype: SpeakingSubtype::ReadAloud,
            question: QuestionContext {
                reference_text: Some("The quick brown fox jumps over the lazy dog".to_string()),
                prompt: None,
            },
            transcript: Some(transcript.to_string()),
            audio_reference: "https://cdn.example.com/a.webm".to_string(),
            duration_ms,
        }
    }

    fn assessment(content: f64, pronunciation: f64, fluency: f64) -> OracleAssessment {
        OracleAssessment {
            pronunciation,
            fluency,
            content,
            feedback: OracleFeedback {
                strengths: vec!["clear vowels".to_string()],
                improvements: vec!["linking".to_string()],
                detailed_analysis: "Good overall".to_string(),
            },
        }
    }

    fn unavailable() -> ScoringEngine {
        ScoringEngine::new(Arc::new(UnavailableOracle), Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_empty_transcript_scores_zero() {
        let result = unavailable().score_attempt(&input("", 0)).await;
        assert_eq!((result.content, result.pronunciation, result.fluency, result.total), (0, 0, 0, 0));
        assert!(result.feedback.summary.starts_with("No speech detected"));
        assert_eq!(result.meta.source, ScoreSource::NoSpeech);
    }

    #[tokio::test]
    async fn test_short_recording_treated_as_no_speech() {
        let result = unavailable().score_attempt(&input("hello there", 499)).await;
        assert_eq!(result.total, 0);
        assert_eq!(result.meta.source, ScoreSource::NoSpeech);
    }

    #[tokio::test]
    async fn test_oracle_scores_are_banded() {
        let engine = ScoringEngine::new(
            Arc::new(FixedOracle(assessment(85.0, 61.0, 60.0))),
            Duration::from_secs(1),
        );
        let result = engine.score_attempt(&input("The quick brown fox jumps", 4000)).await;

        assert_eq!((result.content, result.pronunciation, result.fluency), (5, 4, 3));
        // 5*18*0.4 + 4*18*0.3 + 3*18*0.3 = 36 + 21.6 + 16.2 = 73.8
        assert_eq!(result.total, 74);
        assert_eq!(result.descriptor, "Good");
        assert_eq!(result.meta.source, ScoreSource::Oracle);
        assert_eq!(result.feedback.strengths, vec!["clear vowels".to_string()]);
        assert_eq!(result.feedback.detailed_analysis.as_deref(), Some("Good overall"));
    }

    #[tokio::test]
    async fn test_invalid_oracle_scores_fall_back() {
        let engine = ScoringEngine::new(
            Arc::new(FixedOracle(assessment(120.0, 50.0, 50.0))),
            Duration::from_secs(1),
        );
        let result = engine.score_attempt(&input("The quick brown fox jumps", 4000)).await;
        assert_eq!(result.meta.source, ScoreSource::Heuristic);
        assert!(result.meta.fallback_reason.is_some());
    }

    #[tokio::test]
    async fn test_unavailable_oracle_uses_heuristics() {
        let result = unavailable()
            .score_attempt(&input("The quick brown fox jumps", 4000))
            .await;

        assert!((result.meta.words_per_minute - 75.0).abs() < 1e-9);
        assert_eq!(result.meta.filler_rate, 0.0);
        assert_eq!((result.content, result.pronunciation, result.fluency), (3, 3, 3));
        assert_eq!(result.total, 54);
        assert!(result.is_degraded());
        assert!(result.feedback.summary.contains("120-150 words per minute"));
    }

    #[tokio::test]
    async fn test_slow_oracle_times_out_into_fallback() {
        let engine = ScoringEngine::new(Arc::new(SlowOracle), Duration::from_millis(100));
        let result = engine.score_attempt(&input("The quick brown fox jumps", 4000)).await;
        assert_eq!(result.meta.source, ScoreSource::Heuristic);
        assert!(result
            .meta
            .fallback_reason
            .as_deref()
            .is_some_and(|reason| reason.contains("timed out")));
    }
}
