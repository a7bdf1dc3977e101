//! External assessment oracle
//!
//! The oracle turns a transcript plus rubric context into three 0-90
//! sub-scores and qualitative feedback. Any failure here is absorbed by the
//! Scoring Engine, which falls back to heuristics.

pub mod http_client;

pub use http_client::HttpOracleClient;

use async_trait::async_trait;
use pte_common::models::SpeakingSubtype;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::scoring::bands::MAX_SCORE;

/// Oracle failure modes
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("Oracle call timed out after {0} ms")]
    Timeout(u64),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Oracle API error {0}: {1}")]
    Api(u16, String),

    /// The oracle's own quota is used up (HTTP 429)
    #[error("Oracle quota exhausted")]
    QuotaExhausted,

    #[error("Invalid oracle response: {0}")]
    InvalidResponse(String),

    #[error("Oracle unavailable: {0}")]
    Unavailable(String),
}

/// One structured assessment request per attempt
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OracleRequest {
    pub attempt_id: Uuid,
    pub subtype: SpeakingSubtype,
    pub transcript: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    pub rubric: String,
}

/// Qualitative part of an oracle response
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OracleFeedback {
    pub strengths: Vec<String>,
    pub improvements: Vec<String>,
    pub detailed_analysis: String,
}

/// Oracle response: `{pronunciation, fluency, content, feedback}`
///
/// Unknown fields are tolerated; missing ones fail deserialization.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OracleAssessment {
    pub pronunciation: f64,
    pub fluency: f64,
    pub content: f64,
    pub feedback: OracleFeedback,
}

impl OracleAssessment {
    /// Reject scores outside the 0-90 scale
    pub fn validate(&self) -> Result<(), OracleError> {
        for (name, value) in [
            ("pronunciation", self.pronunciation),
            ("fluency", self.fluency),
            ("content", self.content),
        ] {
            if !value.is_finite() || !(0.0..=MAX_SCORE).contains(&value) {
                return Err(OracleError::InvalidResponse(format!(
                    "{} score {} outside 0-90",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// Assessment backend used by the Scoring Engine
#[async_trait]
pub trait AssessmentOracle: Send + Sync {
    /// Name reported by the health endpoint
    fn name(&self) -> &'static str;

    async fn assess(&self, request: &OracleRequest) -> Result<OracleAssessment, OracleError>;
}

/// Oracle used when no endpoint is configured: every call fails
#[derive(Debug, Default)]
pub struct UnavailableOracle;

impl UnavailableOracle {
    pub const NAME: &'static str = "unavailable";
}

#[async_trait]
impl AssessmentOracle for UnavailableOracle {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn assess(&self, _request: &OracleRequest) -> Result<OracleAssessment, OracleError> {
        Err(OracleError::Unavailable("no oracle endpoint configured".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_shape_parses() {
        let json = r#"{
            "pronunciation": 72,
            "fluency": 65.5,
            "content": 80,
            "feedback": {
                "strengths": ["clear"],
                "improvements": ["pace"],
                "detailedAnalysis": "solid",
                "extra": true
            }
        }"#;
        let parsed: OracleAssessment = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.fluency, 65.5);
        assert_eq!(parsed.feedback.detailed_analysis, "solid");
        assert!(parsed.validate().is_ok());
    }

    #[test]
    fn test_missing_field_is_rejected() {
        let json = r#"{"pronunciation": 72, "fluency": 65, "feedback": {"strengths": [], "improvements": [], "detailedAnalysis": ""}}"#;
        assert!(serde_json::from_str::<OracleAssessment>(json).is_err());
    }

    #[test]
    fn test_out_of_range_score_is_invalid() {
        let assessment = OracleAssessment {
            pronunciation: 91.0,
            fluency: 10.0,
            content: 10.0,
            feedback: OracleFeedback::default(),
        };
        assert!(matches!(assessment.validate(), Err(OracleError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn test_unavailable_oracle_always_fails() {
        let request = OracleRequest {
            attempt_id: Uuid::new_v4(),
            subtype: SpeakingSubtype::ReadAloud,
            transcript: "hello".to_string(),
            reference_text: None,
            prompt: None,
            rubric: String::new(),
        };
        assert!(matches!(
            UnavailableOracle.assess(&request).await,
            Err(OracleError::Unavailable(_))
        ));
    }
}
