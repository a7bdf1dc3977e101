//! Progress Aggregator
//!
//! Recomputes a per-user longitudinal snapshot after every scored attempt.
//! Rolling skill scores are recomputed from fresh history each time rather
//! than updated incrementally.
//!
//! `sync_after_attempt` never returns an error: the snapshot is a side effect
//! of scoring, so storage failures are logged and dropped.

use chrono::{DateTime, Utc};
use pte_common::events::{EventBus, PteEvent};
use pte_common::models::Skill;
use pte_common::time::{days_between, now};
use pte_common::Result;
use sqlx::SqlitePool;

use crate::db::{attempts, progress as store};
use crate::models::ProgressRecord;

/// Scored results averaged into a rolling skill score
pub const ROLLING_WINDOW: u32 = 10;

/// Study streak after activity at `now`
///
/// Counted in calendar days: same day keeps the streak, the next day extends
/// it, a longer gap (or no prior activity) restarts at 1.
pub fn calculate_streak(last_active_at: Option<DateTime<Utc>>, current_streak: u32, now: DateTime<Utc>) -> u32 {
    let Some(last) = last_active_at else {
        return 1;
    };

    match days_between(last, now) {
        0 => current_streak.max(1),
        1 => current_streak + 1,
        _ => 1,
    }
}

/// Minutes credited for `seconds` of study (partial minutes round up)
pub fn study_minutes(seconds: Option<u64>) -> u32 {
    match seconds {
        Some(secs) if secs > 0 => secs.div_ceil(60).min(u64::from(u32::MAX)) as u32,
        _ => 1,
    }
}

/// Rounded mean of nonzero values; 0 when there are none
pub fn rounded_mean(values: &[u32]) -> u32 {
    let nonzero: Vec<u32> = values.iter().copied().filter(|v| *v > 0).collect();
    if nonzero.is_empty() {
        return 0;
    }
    let sum: u64 = nonzero.iter().map(|v| u64::from(*v)).sum();
    (sum as f64 / nonzero.len() as f64).round() as u32
}

/// Overall score: mean of the skills that have a nonzero rolling score
pub fn overall_score(record: &ProgressRecord) -> u32 {
    let skills: Vec<u32> = Skill::ALL.iter().map(|s| record.skill_score(*s)).collect();
    rounded_mean(&skills)
}

#[derive(Clone)]
pub struct ProgressAggregator {
    pool: SqlitePool,
    event_bus: EventBus,
}

impl ProgressAggregator {
    pub fn new(pool: SqlitePool, event_bus: EventBus) -> Self {
        Self { pool, event_bus }
    }

    pub async fn get(&self, user_id: &str) -> Result<Option<ProgressRecord>> {
        store::get_progress(&self.pool, user_id).await
    }

    pub async fn sync_after_attempt(&self, user_id: &str, skill: Skill, score: u32, time_spent_secs: Option<u64>) {
        self.sync_after_attempt_at(user_id, skill, score, time_spent_secs, now())
            .await
    }

    /// Fold one scored result into the snapshot; failures are logged only
    pub async fn sync_after_attempt_at(
        &self,
        user_id: &str,
        skill: Skill,
        score: u32,
        time_spent_secs: Option<u64>,
        now: DateTime<Utc>,
    ) {
        match self.sync_inner(user_id, skill, score, time_spent_secs, now).await {
            Ok(record) => {
                tracing::debug!(
                    user_id,
                    skill = %skill,
                    overall_score = record.overall_score,
                    study_streak = record.study_streak,
                    "Progress synced"
                );
                self.event_bus.emit_lossy(PteEvent::ProgressSynced {
                    user_id: user_id.to_string(),
                    overall_score: record.overall_score,
                    study_streak: record.study_streak,
                    timestamp: now,
                });
            }
            Err(e) => {
                tracing::warn!(user_id, skill = %skill, error = %e, "Progress sync failed; snapshot left unchanged");
            }
        }
    }

    /// Store a non-speaking result, then sync
    ///
    /// Only the insert can fail; the sync that follows never does.
    pub async fn record_result(
        &self,
        user_id: &str,
        skill: Skill,
        score: u32,
        time_spent_secs: Option<u64>,
    ) -> Result<()> {
        let now = now();
        store::insert_skill_result(&self.pool, user_id, skill, score, now).await?;
        self.sync_after_attempt_at(user_id, skill, score, time_spent_secs, now)
            .await;
        Ok(())
    }

    async fn sync_inner(
        &self,
        user_id: &str,
        skill: Skill,
        score: u32,
        time_spent_secs: Option<u64>,
        now: DateTime<Utc>,
    ) -> Result<ProgressRecord> {
        let minutes = study_minutes(time_spent_secs);

        let record = match store::get_progress(&self.pool, user_id).await? {
            None => {
                let mut record = ProgressRecord {
                    user_id: user_id.to_string(),
                    speaking_score: 0,
                    writing_score: 0,
                    reading_score: 0,
                    listening_score: 0,
                    overall_score: score,
                    questions_answered: 1,
                    total_study_time: minutes,
                    last_active_at: Some(now),
                    study_streak: 1,
                    updated_at: now,
                };
                record.set_skill_score(skill, score);
                record
            }
            Some(mut record) => {
                record.study_streak = calculate_streak(record.last_active_at, record.study_streak, now);

                let recent = self.recent_scores(user_id, skill).await?;
                record.set_skill_score(skill, rounded_mean(&recent));
                record.overall_score = overall_score(&record);

                record.questions_answered = record.questions_answered.saturating_add(1);
                record.total_study_time = record.total_study_time.saturating_add(minutes);
                record.last_active_at = Some(now);
                record.updated_at = now;
                record
            }
        };

        store::upsert_progress(&self.pool, &record).await?;
        Ok(record)
    }

    async fn recent_scores(&self, user_id: &str, skill: Skill) -> Result<Vec<u32>> {
        match skill {
            Skill::Speaking => attempts::recent_speaking_scores(&self.pool, user_id, ROLLING_WINDOW).await,
            other => store::recent_skill_scores(&self.pool, user_id, other, ROLLING_WINDOW).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, day, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_streak_rules() {
        let now = at(10, 12);
        assert_eq!(calculate_streak(None, 0, now), 1);
        assert_eq!(calculate_streak(Some(at(10, 1)), 5, now), 5);
        assert_eq!(calculate_streak(Some(now - Duration::days(1)), 5, now), 6);
        assert_eq!(calculate_streak(Some(now - Duration::days(3)), 5, now), 1);
    }

    #[test]
    fn test_streak_uses_calendar_days_not_24h_windows() {
        // 23:00 yesterday to 01:00 today is two hours but one calendar day
        let last = Utc.with_ymd_and_hms(2025, 3, 9, 23, 0, 0).unwrap();
        assert_eq!(calculate_streak(Some(last), 2, at(10, 1)), 3);
    }

    #[test]
    fn test_study_minutes_round_up() {
        assert_eq!(study_minutes(Some(61)), 2);
        assert_eq!(study_minutes(Some(60)), 1);
        assert_eq!(study_minutes(None), 1);
        assert_eq!(study_minutes(Some(0)), 1);
    }

    #[test]
    fn test_rounded_mean_ignores_zeros() {
        assert_eq!(rounded_mean(&[]), 0);
        assert_eq!(rounded_mean(&[0, 0]), 0);
        assert_eq!(rounded_mean(&[60, 0, 71]), 66);
    }

    #[test]
    fn test_overall_excludes_untried_skills() {
        let record = ProgressRecord {
            user_id: "u".to_string(),
            speaking_score: 60,
            writing_score: 0,
            reading_score: 80,
            listening_score: 0,
            overall_score: 0,
            questions_answered: 0,
            total_study_time: 0,
            last_active_at: None,
            study_streak: 0,
            updated_at: at(1, 0),
        };
        assert_eq!(overall_score(&record), 70);
    }
}
