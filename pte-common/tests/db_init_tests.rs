//! Tests for database initialization
//!
//! Verifies that the schema is created on first run, reopening is safe, and
//! the storage-level invariants reject inconsistent rows.

use pte_common::db::{create_schema, init_database, init_memory_database};
use tempfile::TempDir;

#[tokio::test]
async fn test_database_creation_when_missing() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("nested").join("pte.db");

    let result = init_database(&db_path).await;
    assert!(result.is_ok(), "Database initialization failed: {:?}", result.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_opens_existing() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("pte.db");

    let pool1 = init_database(&db_path).await.expect("first open");
    sqlx::query(
        "INSERT INTO credit_ledgers (user_id, daily_allotment, used_today, last_reset_at)
         VALUES ('u1', 4, 1, '2025-01-01T00:00:00.000Z')",
    )
    .execute(&pool1)
    .await
    .unwrap();
    pool1.close().await;

    // Second open keeps existing rows
    let pool2 = init_database(&db_path).await.expect("second open");
    let used: i64 = sqlx::query_scalar("SELECT used_today FROM credit_ledgers WHERE user_id = 'u1'")
        .fetch_one(&pool2)
        .await
        .unwrap();
    assert_eq!(used, 1);
}

#[tokio::test]
async fn test_schema_creation_is_idempotent() {
    let pool = init_memory_database().await.unwrap();
    create_schema(&pool).await.expect("second schema pass should succeed");

    let tables: Vec<String> =
        sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .fetch_all(&pool)
            .await
            .unwrap();

    for expected in ["attempts", "credit_ledgers", "credit_logs", "skill_results", "user_progress"] {
        assert!(tables.iter().any(|t| t == expected), "missing table {}", expected);
    }
}

#[tokio::test]
async fn test_scores_present_only_when_scored() {
    let pool = init_memory_database().await.unwrap();

    let insert = |status: &'static str, scores: Option<&'static str>| {
        let pool = pool.clone();
        async move {
            sqlx::query(
                "INSERT INTO attempts (id, user_id, question_id, subtype, audio_reference,
                    duration_ms, status, scores, created_at, updated_at)
                 VALUES (?, 'u1', 'q1', 'read_aloud', 'https://x/a.webm', 1000, ?, ?,
                    '2025-01-01T00:00:00.000Z', '2025-01-01T00:00:00.000Z')",
            )
            .bind(uuid::Uuid::new_v4().to_string())
            .bind(status)
            .bind(scores)
            .execute(&pool)
            .await
        }
    };

    assert!(insert("pending", None).await.is_ok());
    assert!(insert("scored", Some("{}")).await.is_ok());
    assert!(insert("scored", None).await.is_err(), "scored without scores must be rejected");
    assert!(insert("pending", Some("{}")).await.is_err(), "scores without scored must be rejected");
    assert!(insert("done", None).await.is_err(), "unknown status must be rejected");
}

#[tokio::test]
async fn test_ledger_cannot_exceed_allotment() {
    let pool = init_memory_database().await.unwrap();

    let over = sqlx::query(
        "INSERT INTO credit_ledgers (user_id, daily_allotment, used_today, last_reset_at)
         VALUES ('u1', 2, 3, '2025-01-01T00:00:00.000Z')",
    )
    .execute(&pool)
    .await;
    assert!(over.is_err());

    let unlimited = sqlx::query(
        "INSERT INTO credit_ledgers (user_id, daily_allotment, used_today, last_reset_at)
         VALUES ('u2', -1, 300, '2025-01-01T00:00:00.000Z')",
    )
    .execute(&pool)
    .await;
    assert!(unlimited.is_ok());
}
