//! Database initialization
//!
//! Opens (or creates) the SQLite database and creates every table the
//! scoring service owns. All statements are idempotent, so initialisation is
//! safe to run on every startup.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Busy timeout applied to every connection
pub const BUSY_TIMEOUT_MS: u64 = 5000;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // Per-connection pragmas: WAL for concurrent readers with one writer,
    // busy timeout so contended writers wait instead of failing
    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path.display()))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
        .busy_timeout(Duration::from_millis(BUSY_TIMEOUT_MS));

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;

    Ok(pool)
}

/// Open a private in-memory database with the full schema
///
/// Limited to one connection: every `:memory:` connection is a separate database.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create all tables (idempotent - safe to call multiple times)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_attempts_table(pool).await?;
    create_credit_ledgers_table(pool).await?;
    create_credit_logs_table(pool).await?;
    create_user_progress_table(pool).await?;
    create_skill_results_table(pool).await?;

    info!("Database tables initialized (attempts, credit_ledgers, credit_logs, user_progress, skill_results)");
    Ok(())
}

/// Speaking attempts
///
/// `scores` is a JSON `ScoreResult`, present exactly when `status = 'scored'`.
/// `overall_score` duplicates `scores.total` for progress queries.
pub async fn create_attempts_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS attempts (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            question_id TEXT NOT NULL,
            subtype TEXT NOT NULL,
            audio_reference TEXT NOT NULL,
            transcript TEXT,
            reference_text TEXT,
            prompt TEXT,
            duration_ms INTEGER NOT NULL,
            words_per_minute REAL NOT NULL DEFAULT 0,
            filler_rate REAL NOT NULL DEFAULT 0,
            timings TEXT NOT NULL DEFAULT '{}',
            status TEXT NOT NULL DEFAULT 'pending'
                CHECK (status IN ('pending', 'processing', 'scored', 'failed')),
            scores TEXT,
            overall_score INTEGER,
            scoring_attempts INTEGER NOT NULL DEFAULT 0,
            last_error TEXT,
            scored_at TEXT,
            is_public INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            CHECK ((status = 'scored') = (scores IS NOT NULL))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_attempts_user_created ON attempts(user_id, created_at)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_attempts_status_updated ON attempts(status, updated_at)")
        .execute(pool)
        .await?;

    Ok(())
}

/// One credit ledger per user
///
/// `daily_allotment = -1` means unlimited. `last_reset_at` is RFC 3339 UTC, so
/// `substr(last_reset_at, 1, 10)` is its calendar day.
pub async fn create_credit_ledgers_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS credit_ledgers (
            user_id TEXT PRIMARY KEY,
            daily_allotment INTEGER NOT NULL CHECK (daily_allotment >= -1),
            used_today INTEGER NOT NULL DEFAULT 0 CHECK (used_today >= 0),
            last_reset_at TEXT NOT NULL,
            CHECK (daily_allotment = -1 OR used_today <= daily_allotment)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Append-only log of successful deductions
pub async fn create_credit_logs_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS credit_logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            amount INTEGER NOT NULL,
            day TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_credit_logs_user_day ON credit_logs(user_id, day)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Longitudinal progress snapshot, one row per user
pub async fn create_user_progress_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS user_progress (
            user_id TEXT PRIMARY KEY,
            speaking_score INTEGER NOT NULL DEFAULT 0,
            writing_score INTEGER NOT NULL DEFAULT 0,
            reading_score INTEGER NOT NULL DEFAULT 0,
            listening_score INTEGER NOT NULL DEFAULT 0,
            overall_score INTEGER NOT NULL DEFAULT 0,
            questions_answered INTEGER NOT NULL DEFAULT 0,
            total_study_time INTEGER NOT NULL DEFAULT 0,
            last_active_at TEXT,
            study_streak INTEGER NOT NULL DEFAULT 0,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Scored results for the writing/reading/listening skills
///
/// Speaking history comes from `attempts`; the other skills are graded outside
/// this service and reported here.
pub async fn create_skill_results_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS skill_results (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            skill TEXT NOT NULL,
            score INTEGER NOT NULL,
            recorded_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_skill_results_user_skill ON skill_results(user_id, skill, recorded_at)")
        .execute(pool)
        .await?;

    Ok(())
}
