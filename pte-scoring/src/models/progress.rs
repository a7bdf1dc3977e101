//! Progress snapshot shapes

use chrono::{DateTime, Utc};
use pte_common::models::Skill;
use serde::{Deserialize, Serialize};

/// Per-user longitudinal progress snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    pub user_id: String,
    pub speaking_score: u32,
    pub writing_score: u32,
    pub reading_score: u32,
    pub listening_score: u32,
    /// Mean of the nonzero skill scores
    pub overall_score: u32,
    pub questions_answered: u32,
    /// Minutes
    pub total_study_time: u32,
    pub last_active_at: Option<DateTime<Utc>>,
    pub study_streak: u32,
    pub updated_at: DateTime<Utc>,
}

impl ProgressRecord {
    pub fn skill_score(&self, skill: Skill) -> u32 {
        match skill {
            Skill::Speaking => self.speaking_score,
            Skill::Writing => self.writing_score,
            Skill::Reading => self.reading_score,
            Skill::Listening => self.listening_score,
        }
    }

    pub fn set_skill_score(&mut self, skill: Skill, score: u32) {
        match skill {
            Skill::Speaking => self.speaking_score = score,
            Skill::Writing => self.writing_score = score,
            Skill::Reading => self.reading_score = score,
            Skill::Listening => self.listening_score = score,
        }
    }
}

/// Result of a non-speaking question graded elsewhere
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillResultInput {
    pub skill: Skill,
    /// 0-90
    pub score: u32,
    #[serde(default)]
    pub time_spent_secs: Option<u64>,
}
