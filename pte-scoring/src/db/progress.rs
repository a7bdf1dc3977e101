//! Progress snapshot and skill result database operations

use chrono::{DateTime, Utc};
use pte_common::models::Skill;
use pte_common::time::{from_db, opt_from_db, to_db};
use pte_common::Result;
use sqlx::{Row, SqlitePool};

use crate::models::ProgressRecord;

fn as_u32(value: i64) -> u32 {
    value.clamp(0, i64::from(u32::MAX)) as u32
}

pub async fn get_progress(pool: &SqlitePool, user_id: &str) -> Result<Option<ProgressRecord>> {
    let row = sqlx::query(
        r#"
        SELECT user_id, speaking_score, writing_score, reading_score, listening_score,
               overall_score, questions_answered, total_study_time, last_active_at,
               study_streak, updated_at
        FROM user_progress
        WHERE user_id = ?
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let updated_at: String = row.get("updated_at");
    Ok(Some(ProgressRecord {
        user_id: row.get("user_id"),
        speaking_score: as_u32(row.get("speaking_score")),
        writing_score: as_u32(row.get("writing_score")),
        reading_score: as_u32(row.get("reading_score")),
        listening_score: as_u32(row.get("listening_score")),
        overall_score: as_u32(row.get("overall_score")),
        questions_answered: as_u32(row.get("questions_answered")),
        total_study_time: as_u32(row.get("total_study_time")),
        last_active_at: opt_from_db(row.get("last_active_at"))?,
        study_streak: as_u32(row.get("study_streak")),
        updated_at: from_db(&updated_at)?,
    }))
}

/// Insert or replace the whole snapshot
pub async fn upsert_progress(pool: &SqlitePool, record: &ProgressRecord) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO user_progress (
            user_id, speaking_score, writing_score, reading_score, listening_score,
            overall_score, questions_answered, total_study_time, last_active_at,
            study_streak, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(user_id) DO UPDATE SET
            speaking_score = excluded.speaking_score,
            writing_score = excluded.writing_score,
            reading_score = excluded.reading_score,
            listening_score = excluded.listening_score,
            overall_score = excluded.overall_score,
            questions_answered = excluded.questions_answered,
            total_study_time = excluded.total_study_time,
            last_active_at = excluded.last_active_at,
            study_streak = excluded.study_streak,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(&record.user_id)
    .bind(i64::from(record.speaking_score))
    .bind(i64::from(record.writing_score))
    .bind(i64::from(record.reading_score))
    .bind(i64::from(record.listening_score))
    .bind(i64::from(record.overall_score))
    .bind(i64::from(record.questions_answered))
    .bind(i64::from(record.total_study_time))
    .bind(record.last_active_at.map(to_db))
    .bind(i64::from(record.study_streak))
    .bind(to_db(record.updated_at))
    .execute(pool)
    .await?;

    Ok(())
}

/// Store a graded non-speaking result
pub async fn insert_skill_result(
    pool: &SqlitePool,
    user_id: &str,
    skill: Skill,
    score: u32,
    recorded_at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query("INSERT INTO skill_results (user_id, skill, score, recorded_at) VALUES (?, ?, ?, ?)")
        .bind(user_id)
        .bind(skill.as_str())
        .bind(i64::from(score))
        .bind(to_db(recorded_at))
        .execute(pool)
        .await?;

    Ok(())
}

/// Most recent results for a non-speaking skill, newest first
///
/// Zeros are kept so the window is the last `limit` results; the mean drops them.
pub async fn recent_skill_scores(pool: &SqlitePool, user_id: &str, skill: Skill, limit: u32) -> Result<Vec<u32>> {
    let scores: Vec<i64> = sqlx::query_scalar(
        r#"
        SELECT score
        FROM skill_results
        WHERE user_id = ? AND skill = ?
        ORDER BY recorded_at DESC, id DESC
        LIMIT ?
        "#,
    )
    .bind(user_id)
    .bind(skill.as_str())
    .bind(i64::from(limit))
    .fetch_all(pool)
    .await?;

    Ok(scores.into_iter().map(as_u32).collect())
}
