//! Attempt database operations
//!
//! Status writes are conditional so a `scored` attempt never regresses, and
//! repeated scoring of the same attempt overwrites instead of accumulating.

use chrono::{DateTime, Utc};
use pte_common::models::{AttemptStatus, ScoreResult, SpeakingSubtype};
use pte_common::time::{from_db, opt_from_db, to_db};
use pte_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::models::{Attempt, AttemptTimings};

const ATTEMPT_COLUMNS: &str = r#"
    id, user_id, question_id, subtype, audio_reference, transcript, reference_text, prompt,
    duration_ms, words_per_minute, filler_rate, timings, status, scores,
    scoring_attempts, last_error, scored_at, is_public, created_at, updated_at
"#;

/// Outcome of a score write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Attempt moved to `scored` for the first time
    FirstScore,
    /// Attempt was already scored; scores replaced
    Overwritten,
    /// No such attempt
    NotFound,
}

fn row_to_attempt(row: &SqliteRow) -> Result<Attempt> {
    let id: String = row.get("id");
    let id = Uuid::parse_str(&id).map_err(|e| Error::Internal(format!("Invalid attempt id '{}': {}", id, e)))?;

    let subtype: String = row.get("subtype");
    let status: String = row.get("status");

    let timings: String = row.get("timings");
    let timings: AttemptTimings = serde_json::from_str(&timings)?;

    let scores: Option<String> = row.get("scores");
    let scores: Option<ScoreResult> = scores.as_deref().map(serde_json::from_str::<ScoreResult>).transpose()?;

    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(Attempt {
        id,
        user_id: row.get("user_id"),
        question_id: row.get("question_id"),
        subtype: subtype.parse::<SpeakingSubtype>()?,
        audio_reference: row.get("audio_reference"),
        transcript: row.get("transcript"),
        reference_text: row.get("reference_text"),
        prompt: row.get("prompt"),
        duration_ms: row.get::<i64, _>("duration_ms").max(0) as u64,
        words_per_minute: row.get("words_per_minute"),
        filler_rate: row.get("filler_rate"),
        timings,
        status: status.parse::<AttemptStatus>()?,
        scores,
        scoring_attempts: row.get::<i64, _>("scoring_attempts").max(0) as u32,
        last_error: row.get("last_error"),
        scored_at: opt_from_db(row.get("scored_at"))?,
        is_public: row.get::<i64, _>("is_public") != 0,
        created_at: from_db(&created_at)?,
        updated_at: from_db(&updated_at)?,
    })
}

/// Insert a newly submitted attempt
pub async fn insert_attempt(pool: &SqlitePool, attempt: &Attempt) -> Result<()> {
    let timings = serde_json::to_string(&attempt.timings)?;

    sqlx::query(
        r#"
        INSERT INTO attempts (
            id, user_id, question_id, subtype, audio_reference, transcript, reference_text, prompt,
            duration_ms, words_per_minute, filler_rate, timings, status,
            scoring_attempts, is_public, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(attempt.id.to_string())
    .bind(&attempt.user_id)
    .bind(&attempt.question_id)
    .bind(attempt.subtype.as_str())
    .bind(&attempt.audio_reference)
    .bind(&attempt.transcript)
    .bind(&attempt.reference_text)
    .bind(&attempt.prompt)
    .bind(attempt.duration_ms as i64)
    .bind(attempt.words_per_minute)
    .bind(attempt.filler_rate)
    .bind(timings)
    .bind(attempt.status.as_str())
    .bind(i64::from(attempt.scoring_attempts))
    .bind(attempt.is_public)
    .bind(to_db(attempt.created_at))
    .bind(to_db(attempt.updated_at))
    .execute(pool)
    .await?;

    Ok(())
}

/// Load an attempt by id
pub async fn get_attempt(pool: &SqlitePool, id: Uuid) -> Result<Option<Attempt>> {
    let row = sqlx::query(&format!("SELECT {} FROM attempts WHERE id = ?", ATTEMPT_COLUMNS))
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(row_to_attempt).transpose()
}

/// Attempts a user submitted at or after `since`
pub async fn count_since(pool: &SqlitePool, user_id: &str, since: DateTime<Utc>) -> Result<u64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM attempts WHERE user_id = ? AND created_at >= ?")
        .bind(user_id)
        .bind(to_db(since))
        .fetch_one(pool)
        .await?;

    Ok(count.max(0) as u64)
}

/// Move an attempt to `processing` and count the scoring pass
///
/// Returns false when the attempt is missing or already scored.
pub async fn mark_processing(pool: &SqlitePool, id: Uuid, now: DateTime<Utc>) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE attempts
        SET status = 'processing', scoring_attempts = scoring_attempts + 1, updated_at = ?
        WHERE id = ? AND status != 'scored'
        "#,
    )
    .bind(to_db(now))
    .bind(id.to_string())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Persist scores and move the attempt to `scored`
///
/// The first write sets `scored_at`; later writes replace the scores and
/// keep the original `scored_at`.
pub async fn save_scores(
    pool: &SqlitePool,
    id: Uuid,
    scores: &ScoreResult,
    now: DateTime<Utc>,
) -> Result<SaveOutcome> {
    let scores_json = serde_json::to_string(scores)?;
    let now = to_db(now);
    let id = id.to_string();

    let first = sqlx::query(
        r#"
        UPDATE attempts
        SET status = 'scored', scores = ?, overall_score = ?, scored_at = ?,
            last_error = NULL, updated_at = ?
        WHERE id = ? AND status != 'scored'
        "#,
    )
    .bind(&scores_json)
    .bind(i64::from(scores.total))
    .bind(&now)
    .bind(&now)
    .bind(&id)
    .execute(pool)
    .await?;

    if first.rows_affected() == 1 {
        return Ok(SaveOutcome::FirstScore);
    }

    let overwrite = sqlx::query(
        r#"
        UPDATE attempts
        SET scores = ?, overall_score = ?, updated_at = ?
        WHERE id = ? AND status = 'scored'
        "#,
    )
    .bind(&scores_json)
    .bind(i64::from(scores.total))
    .bind(&now)
    .bind(&id)
    .execute(pool)
    .await?;

    if overwrite.rows_affected() == 1 {
        Ok(SaveOutcome::Overwritten)
    } else {
        Ok(SaveOutcome::NotFound)
    }
}

/// Mark an attempt `failed` unless it is already scored
pub async fn mark_failed(pool: &SqlitePool, id: Uuid, error: &str, now: DateTime<Utc>) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE attempts
        SET status = 'failed', last_error = ?, updated_at = ?
        WHERE id = ? AND status != 'scored'
        "#,
    )
    .bind(error)
    .bind(to_db(now))
    .bind(id.to_string())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Unscored attempts untouched since `stale_before`, oldest first
///
/// With `max_attempts`, attempts that already used that many scoring passes
/// are skipped.
pub async fn find_unscored(
    pool: &SqlitePool,
    limit: u32,
    stale_before: DateTime<Utc>,
    max_attempts: Option<u32>,
) -> Result<Vec<Attempt>> {
    let rows = sqlx::query(&format!(
        r#"
        SELECT {}
        FROM attempts
        WHERE status != 'scored'
          AND updated_at <= ?
          AND (? IS NULL OR scoring_attempts < ?)
        ORDER BY updated_at ASC
        LIMIT ?
        "#,
        ATTEMPT_COLUMNS
    ))
    .bind(to_db(stale_before))
    .bind(max_attempts.map(i64::from))
    .bind(max_attempts.map(i64::from))
    .bind(i64::from(limit))
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_attempt).collect()
}

/// A user's attempts, newest first, plus the unpaged total
pub async fn list_for_user(
    pool: &SqlitePool,
    user_id: &str,
    question_id: Option<&str>,
    limit: u32,
    offset: u64,
) -> Result<(Vec<Attempt>, u64)> {
    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM attempts WHERE user_id = ? AND (? IS NULL OR question_id = ?)",
    )
    .bind(user_id)
    .bind(question_id)
    .bind(question_id)
    .fetch_one(pool)
    .await?;

    let rows = sqlx::query(&format!(
        r#"
        SELECT {}
        FROM attempts
        WHERE user_id = ? AND (? IS NULL OR question_id = ?)
        ORDER BY created_at DESC, id
        LIMIT ? OFFSET ?
        "#,
        ATTEMPT_COLUMNS
    ))
    .bind(user_id)
    .bind(question_id)
    .bind(question_id)
    .bind(i64::from(limit))
    .bind(offset as i64)
    .fetch_all(pool)
    .await?;

    let attempts = rows.iter().map(row_to_attempt).collect::<Result<Vec<_>>>()?;
    Ok((attempts, total.max(0) as u64))
}

/// Flip `is_public` on an attempt owned by `user_id`
///
/// Returns the new value, or `None` if the user owns no such attempt.
pub async fn toggle_public(pool: &SqlitePool, id: Uuid, user_id: &str) -> Result<Option<bool>> {
    let value: Option<i64> = sqlx::query_scalar(
        r#"
        UPDATE attempts
        SET is_public = 1 - is_public
        WHERE id = ? AND user_id = ?
        RETURNING is_public
        "#,
    )
    .bind(id.to_string())
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(value.map(|v| v != 0))
}

/// Totals of a user's most recent scored speaking attempts, newest first
///
/// Zero totals stay in the window; the rolling mean ignores them.
pub async fn recent_speaking_scores(pool: &SqlitePool, user_id: &str, limit: u32) -> Result<Vec<u32>> {
    let scores: Vec<i64> = sqlx::query_scalar(
        r#"
        SELECT overall_score
        FROM attempts
        WHERE user_id = ? AND status = 'scored'
        ORDER BY created_at DESC
        LIMIT ?
        "#,
    )
    .bind(user_id)
    .bind(i64::from(limit))
    .fetch_all(pool)
    .await?;

    Ok(scores.into_iter().map(|s| s.max(0) as u32).collect())
}
