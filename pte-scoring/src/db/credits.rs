//! Credit ledger database operations
//!
//! The calendar day of `last_reset_at` is its first ten characters, compared
//! as text against a `YYYY-MM-DD` day key.

use chrono::{DateTime, Utc};
use pte_common::time::{day_key, from_db, to_db};
use pte_common::Result;
use sqlx::{Row, SqlitePool};

/// Stored ledger row
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerRow {
    /// `-1` = unlimited
    pub daily_allotment: i64,
    pub used_today: i64,
    pub last_reset_at: DateTime<Utc>,
}

/// Create the user's ledger with `default_allotment` if it does not exist
pub async fn ensure_ledger(
    pool: &SqlitePool,
    user_id: &str,
    default_allotment: i64,
    now: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT OR IGNORE INTO credit_ledgers (user_id, daily_allotment, used_today, last_reset_at)
        VALUES (?, ?, 0, ?)
        "#,
    )
    .bind(user_id)
    .bind(default_allotment)
    .bind(to_db(now))
    .execute(pool)
    .await?;

    Ok(())
}

/// Zero `used_today` if the last reset happened on an earlier calendar day
///
/// Returns true when a reset happened.
pub async fn reset_if_new_day(pool: &SqlitePool, user_id: &str, now: DateTime<Utc>) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE credit_ledgers
        SET used_today = 0, last_reset_at = ?
        WHERE user_id = ? AND substr(last_reset_at, 1, 10) < ?
        "#,
    )
    .bind(to_db(now))
    .bind(user_id)
    .bind(day_key(now))
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn get_ledger(pool: &SqlitePool, user_id: &str) -> Result<Option<LedgerRow>> {
    let row = sqlx::query(
        "SELECT daily_allotment, used_today, last_reset_at FROM credit_ledgers WHERE user_id = ?",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => {
            let last_reset_at: String = row.get("last_reset_at");
            Ok(Some(LedgerRow {
                daily_allotment: row.get("daily_allotment"),
                used_today: row.get("used_today"),
                last_reset_at: from_db(&last_reset_at)?,
            }))
        }
        None => Ok(None),
    }
}

/// Guarded increment with the lazy reset folded in, plus the log row
///
/// One UPDATE decides and applies the deduction, so concurrent callers
/// cannot both pass the check. Returns false (nothing written) when the
/// allotment would be exceeded or the ledger does not exist.
pub async fn try_deduct(pool: &SqlitePool, user_id: &str, amount: u32, now: DateTime<Utc>) -> Result<bool> {
    let today = day_key(now);
    let now_text = to_db(now);
    let amount = i64::from(amount);

    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        r#"
        UPDATE credit_ledgers
        SET used_today = CASE WHEN substr(last_reset_at, 1, 10) < ?1 THEN ?2 ELSE used_today + ?2 END,
            last_reset_at = CASE WHEN substr(last_reset_at, 1, 10) < ?1 THEN ?3 ELSE last_reset_at END
        WHERE user_id = ?4
          AND (
            daily_allotment = -1
            OR (CASE WHEN substr(last_reset_at, 1, 10) < ?1 THEN 0 ELSE used_today END) + ?2 <= daily_allotment
          )
        "#,
    )
    .bind(&today)
    .bind(amount)
    .bind(&now_text)
    .bind(user_id)
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() != 1 {
        tx.rollback().await?;
        return Ok(false);
    }

    sqlx::query("INSERT INTO credit_logs (user_id, amount, day, created_at) VALUES (?, ?, ?, ?)")
        .bind(user_id)
        .bind(amount)
        .bind(&today)
        .bind(&now_text)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(true)
}

/// Change the allotment, clamping today's usage to the new limit
pub async fn set_allotment(pool: &SqlitePool, user_id: &str, allotment: i64) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE credit_ledgers
        SET daily_allotment = ?1,
            used_today = CASE WHEN ?1 = -1 THEN used_today ELSE MIN(used_today, ?1) END
        WHERE user_id = ?2
        "#,
    )
    .bind(allotment)
    .bind(user_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Credits used per calendar day from `since_day` (inclusive), oldest first
pub async fn usage_by_day(pool: &SqlitePool, user_id: &str, since_day: &str) -> Result<Vec<(String, u32)>> {
    let rows = sqlx::query(
        r#"
        SELECT day, SUM(amount) AS used
        FROM credit_logs
        WHERE user_id = ? AND day >= ?
        GROUP BY day
        ORDER BY day ASC
        "#,
    )
    .bind(user_id)
    .bind(since_day)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| {
            let used: i64 = row.get("used");
            (row.get("day"), used.max(0) as u32)
        })
        .collect())
}
