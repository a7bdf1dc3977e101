//! Attempt records and the submission/polling shapes around them

use chrono::{DateTime, Utc};
use pte_common::models::{AttemptStatus, ScoreResult, SpeakingSubtype};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Closed time interval recorded by the client
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeInterval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Preparation and recording intervals
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptTimings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prep: Option<TimeInterval>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<TimeInterval>,
}

/// Submission boundary payload
///
/// `subtype` stays a string here so an unknown kind surfaces as a
/// validation error instead of a body-parsing rejection.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAttempt {
    pub question_id: String,
    pub subtype: String,
    pub audio_reference: String,
    #[serde(default)]
    pub transcript: Option<String>,
    /// Reference text or expected answer for the question, when known
    #[serde(default)]
    pub reference_text: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
    pub duration_ms: u64,
    #[serde(default)]
    pub timings: AttemptTimings,
}

/// Durable attempt record
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Attempt {
    pub id: Uuid,
    pub user_id: String,
    pub question_id: String,
    pub subtype: SpeakingSubtype,
    pub audio_reference: String,
    pub transcript: Option<String>,
    pub reference_text: Option<String>,
    pub prompt: Option<String>,
    pub duration_ms: u64,
    pub words_per_minute: f64,
    pub filler_rate: f64,
    pub timings: AttemptTimings,
    pub status: AttemptStatus,
    pub scores: Option<ScoreResult>,
    pub scoring_attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub scored_at: Option<DateTime<Utc>>,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Query string for attempt listing
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListAttemptsQuery {
    pub question_id: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl ListAttemptsQuery {
    pub const DEFAULT_PAGE_SIZE: u32 = 25;
    pub const MAX_PAGE_SIZE: u32 = 100;

    /// Page number, at least 1
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    /// Page size clamped to 1-100
    pub fn page_size(&self) -> u32 {
        self.page_size
            .unwrap_or(Self::DEFAULT_PAGE_SIZE)
            .clamp(1, Self::MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page() - 1) * u64::from(self.page_size())
    }
}

/// One page of attempts
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptPage {
    pub attempts: Vec<Attempt>,
    pub page: u32,
    pub page_size: u32,
    pub total: u64,
}

/// Status reported to polling clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// Status polling boundary response
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringStatus {
    pub attempt_id: Uuid,
    pub status: PollStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scores: Option<ScoreResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_defaults_and_clamps() {
        let query = ListAttemptsQuery::default();
        assert_eq!((query.page(), query.page_size(), query.offset()), (1, 25, 0));

        let query = ListAttemptsQuery {
            question_id: None,
            page: Some(0),
            page_size: Some(500),
        };
        assert_eq!((query.page(), query.page_size()), (1, 100));

        let query = ListAttemptsQuery {
            question_id: None,
            page: Some(3),
            page_size: Some(0),
        };
        assert_eq!((query.page_size(), query.offset()), (1, 2));
    }

    #[test]
    fn test_submission_parses_camel_case() {
        let body = r#"{
            "questionId": "q-1",
            "subtype": "read_aloud",
            "audioReference": "https://cdn.example.com/a.webm",
            "transcript": "hello",
            "durationMs": 3000,
            "timings": {"record": {"start": "2025-01-01T10:00:00Z", "end": "2025-01-01T10:00:03Z"}}
        }"#;
        let submit: SubmitAttempt = serde_json::from_str(body).unwrap();
        assert_eq!(submit.question_id, "q-1");
        assert!(submit.timings.prep.is_none());
        assert!(submit.timings.record.is_some());
    }
}
