//! Integration tests for the progress aggregator

use chrono::{DateTime, TimeZone, Utc};
use pte_common::events::{EventBus, PteEvent};
use pte_common::models::Skill;
use pte_scoring::db::init_memory_database;
use pte_scoring::progress::ProgressAggregator;

fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 4, day, hour, 0, 0).unwrap()
}

async fn aggregator() -> (ProgressAggregator, EventBus) {
    let pool = init_memory_database().await.unwrap();
    let bus = EventBus::new(16);
    (ProgressAggregator::new(pool, bus.clone()), bus)
}

#[tokio::test]
async fn test_first_result_creates_snapshot() {
    let (progress, bus) = aggregator().await;
    let mut rx = bus.subscribe();

    progress
        .record_result("u1", Skill::Writing, 70, Some(150))
        .await
        .unwrap();

    let record = progress.get("u1").await.unwrap().expect("snapshot missing");
    assert_eq!(record.writing_score, 70);
    assert_eq!(record.speaking_score, 0);
    assert_eq!(record.overall_score, 70);
    assert_eq!(record.questions_answered, 1);
    assert_eq!(record.total_study_time, 3);
    assert_eq!(record.study_streak, 1);
    assert!(record.last_active_at.is_some());

    match rx.try_recv().expect("ProgressSynced not emitted") {
        PteEvent::ProgressSynced { user_id, overall_score, .. } => {
            assert_eq!(user_id, "u1");
            assert_eq!(overall_score, 70);
        }
        other => panic!("unexpected event {:?}", other),
    }
}

#[tokio::test]
async fn test_skill_score_is_rolling_mean() {
    let (progress, _bus) = aggregator().await;
    for score in [60, 70, 80] {
        progress.record_result("u1", Skill::Writing, score, None).await.unwrap();
    }

    let record = progress.get("u1").await.unwrap().unwrap();
    assert_eq!(record.writing_score, 70);
    assert_eq!(record.questions_answered, 3);
    assert_eq!(record.total_study_time, 3);
}

#[tokio::test]
async fn test_rolling_window_keeps_latest_ten() {
    let (progress, _bus) = aggregator().await;
    for _ in 0..5 {
        progress.record_result("u1", Skill::Reading, 10, None).await.unwrap();
    }
    for _ in 0..10 {
        progress.record_result("u1", Skill::Reading, 80, None).await.unwrap();
    }

    let record = progress.get("u1").await.unwrap().unwrap();
    assert_eq!(record.reading_score, 80);
}

#[tokio::test]
async fn test_zero_results_count_in_rolling_window() {
    let (progress, _bus) = aggregator().await;
    progress.record_result("u1", Skill::Reading, 80, None).await.unwrap();
    for _ in 0..10 {
        progress.record_result("u1", Skill::Reading, 0, None).await.unwrap();
    }

    let record = progress.get("u1").await.unwrap().unwrap();
    assert_eq!(record.reading_score, 0);
    assert_eq!(record.overall_score, 0);
    assert_eq!(record.questions_answered, 11);
}

#[tokio::test]
async fn test_overall_ignores_untried_skills() {
    let (progress, _bus) = aggregator().await;
    progress.record_result("u1", Skill::Writing, 60, None).await.unwrap();
    progress.record_result("u1", Skill::Listening, 81, None).await.unwrap();

    let record = progress.get("u1").await.unwrap().unwrap();
    assert_eq!(record.writing_score, 60);
    assert_eq!(record.listening_score, 81);
    assert_eq!(record.overall_score, 71);
}

#[tokio::test]
async fn test_streak_follows_calendar_days() {
    let (progress, _bus) = aggregator().await;

    progress.sync_after_attempt_at("u1", Skill::Writing, 50, None, at(1, 9)).await;
    progress.sync_after_attempt_at("u1", Skill::Writing, 50, None, at(1, 20)).await;
    assert_eq!(progress.get("u1").await.unwrap().unwrap().study_streak, 1);

    progress.sync_after_attempt_at("u1", Skill::Writing, 50, None, at(2, 7)).await;
    assert_eq!(progress.get("u1").await.unwrap().unwrap().study_streak, 2);

    // Skipping a day starts over
    progress.sync_after_attempt_at("u1", Skill::Writing, 50, None, at(4, 7)).await;
    let record = progress.get("u1").await.unwrap().unwrap();
    assert_eq!(record.study_streak, 1);
    assert_eq!(record.questions_answered, 4);
    assert_eq!(record.last_active_at, Some(at(4, 7)));
}

#[tokio::test]
async fn test_sync_failure_is_swallowed() {
    let pool = init_memory_database().await.unwrap();
    let progress = ProgressAggregator::new(pool.clone(), EventBus::new(16));
    pool.close().await;

    // Must not panic or propagate
    progress.sync_after_attempt("u1", Skill::Speaking, 70, Some(30)).await;
    assert!(progress.get("u1").await.is_err());
}
