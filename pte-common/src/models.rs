//! Shared domain models
//!
//! Types that cross crate boundaries: they travel inside events, are stored
//! as JSON columns, and are returned by the HTTP API.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Enumerated speaking-task kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeakingSubtype {
    ReadAloud,
    RepeatSentence,
    DescribeImage,
    RetellLecture,
    AnswerShortQuestion,
    SummarizeGroupDiscussion,
    RespondToASituation,
}

impl SpeakingSubtype {
    pub const ALL: [SpeakingSubtype; 7] = [
        SpeakingSubtype::ReadAloud,
        SpeakingSubtype::RepeatSentence,
        SpeakingSubtype::DescribeImage,
        SpeakingSubtype::RetellLecture,
        SpeakingSubtype::AnswerShortQuestion,
        SpeakingSubtype::SummarizeGroupDiscussion,
        SpeakingSubtype::RespondToASituation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SpeakingSubtype::ReadAloud => "read_aloud",
            SpeakingSubtype::RepeatSentence => "repeat_sentence",
            SpeakingSubtype::DescribeImage => "describe_image",
            SpeakingSubtype::RetellLecture => "retell_lecture",
            SpeakingSubtype::AnswerShortQuestion => "answer_short_question",
            SpeakingSubtype::SummarizeGroupDiscussion => "summarize_group_discussion",
            SpeakingSubtype::RespondToASituation => "respond_to_a_situation",
        }
    }
}

impl fmt::Display for SpeakingSubtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SpeakingSubtype {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SpeakingSubtype::ALL
            .iter()
            .copied()
            .find(|subtype| subtype.as_str() == s)
            .ok_or_else(|| crate::Error::InvalidInput(format!("Unknown speaking subtype: {}", s)))
    }
}

/// Durable attempt status
///
/// `Pending -> Processing -> {Scored, Failed}`; `Failed` stays eligible for the sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Pending,
    Processing,
    Scored,
    Failed,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::Pending => "pending",
            AttemptStatus::Processing => "processing",
            AttemptStatus::Scored => "scored",
            AttemptStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttemptStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(AttemptStatus::Pending),
            "processing" => Ok(AttemptStatus::Processing),
            "scored" => Ok(AttemptStatus::Scored),
            "failed" => Ok(AttemptStatus::Failed),
            other => Err(crate::Error::InvalidInput(format!("Unknown attempt status: {}", other))),
        }
    }
}

/// The four practiced skills tracked by the progress snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Skill {
    Speaking,
    Writing,
    Reading,
    Listening,
}

impl Skill {
    pub const ALL: [Skill; 4] = [Skill::Speaking, Skill::Writing, Skill::Reading, Skill::Listening];

    pub fn as_str(&self) -> &'static str {
        match self {
            Skill::Speaking => "speaking",
            Skill::Writing => "writing",
            Skill::Reading => "reading",
            Skill::Listening => "listening",
        }
    }
}

impl fmt::Display for Skill {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Skill {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Skill::ALL
            .iter()
            .copied()
            .find(|skill| skill.as_str() == s)
            .ok_or_else(|| crate::Error::InvalidInput(format!("Unknown skill: {}", s)))
    }
}

/// Where a score result came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreSource {
    /// External assessment oracle produced the sub-scores
    Oracle,
    /// Local closed-form heuristics (oracle failed or unavailable)
    Heuristic,
    /// Empty transcript or too-short recording
    NoSpeech,
}

/// Qualitative feedback attached to a score
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    /// One-paragraph summary shown to the candidate
    pub summary: String,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub improvements: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detailed_analysis: Option<String>,
}

/// Raw 0-90 sub-scores before banding
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawSubScores {
    pub content: f64,
    pub pronunciation: f64,
    pub fluency: f64,
}

/// Scoring metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreMeta {
    pub words_per_minute: f64,
    /// Fraction of tokens that are fillers (0.0-1.0)
    pub filler_rate: f64,
    pub word_count: usize,
    pub source: ScoreSource,
    /// Why the oracle result was not used, if it was not
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<RawSubScores>,
}

/// Normalized result of scoring one attempt
///
/// Sub-scores are bands in `0..=5`; `total` is on the `0..=90` scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreResult {
    pub content: u8,
    pub pronunciation: u8,
    pub fluency: u8,
    pub total: u8,
    pub descriptor: String,
    pub rubric: String,
    pub feedback: Feedback,
    pub meta: ScoreMeta,
}

impl ScoreResult {
    /// True when the result did not come from the oracle
    pub fn is_degraded(&self) -> bool {
        self.meta.source != ScoreSource::Oracle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subtype_round_trips_through_str() {
        for subtype in SpeakingSubtype::ALL {
            assert_eq!(subtype.as_str().parse::<SpeakingSubtype>().unwrap(), subtype);
        }
        assert!("essay".parse::<SpeakingSubtype>().is_err());
    }

    #[test]
    fn test_subtype_serde_matches_as_str() {
        let json = serde_json::to_string(&SpeakingSubtype::RespondToASituation).unwrap();
        assert_eq!(json, "\"respond_to_a_situation\"");
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("scored".parse::<AttemptStatus>().unwrap(), AttemptStatus::Scored);
        assert!("done".parse::<AttemptStatus>().is_err());
    }

    #[test]
    fn test_skill_parse() {
        assert_eq!("listening".parse::<Skill>().unwrap(), Skill::Listening);
        assert!("math".parse::<Skill>().is_err());
    }

    #[test]
    fn test_score_result_uses_camel_case() {
        let result = ScoreResult {
            content: 3,
            pronunciation: 3,
            fluency: 3,
            total: 54,
            descriptor: "Competent".to_string(),
            rubric: String::new(),
            feedback: Feedback::default(),
            meta: ScoreMeta {
                words_per_minute: 75.0,
                filler_rate: 0.0,
                word_count: 5,
                source: ScoreSource::Heuristic,
                fallback_reason: Some("oracle unavailable".to_string()),
                raw: None,
            },
        };

        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"wordsPerMinute\":75.0"));
        assert!(json.contains("\"source\":\"heuristic\""));
        assert!(json.contains("\"fallbackReason\""));
        assert!(result.is_degraded());
    }
}
