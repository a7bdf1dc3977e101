//! Transient scoring job store
//!
//! Lets clients poll in-flight progress without touching the durable
//! attempt record. Entries expire `ttl` after their last update; losing one
//! never affects correctness because the attempt row is ground truth.

use chrono::{DateTime, Duration, Utc};
use pte_common::models::ScoreResult;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringJob {
    pub status: JobStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub scores: Option<ScoreResult>,
    pub error: Option<String>,
    #[serde(skip)]
    expires_at: DateTime<Utc>,
}

/// In-memory job records keyed by attempt id
#[derive(Clone)]
pub struct JobStore {
    jobs: Arc<RwLock<HashMap<Uuid, ScoringJob>>>,
    ttl: Duration,
}

impl JobStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    /// Record that scoring started (replaces any earlier record)
    pub async fn start(&self, attempt_id: Uuid, now: DateTime<Utc>) {
        let job = ScoringJob {
            status: JobStatus::Processing,
            started_at: now,
            completed_at: None,
            scores: None,
            error: None,
            expires_at: now + self.ttl,
        };
        self.jobs.write().await.insert(attempt_id, job);
    }

    pub async fn complete(&self, attempt_id: Uuid, scores: ScoreResult, now: DateTime<Utc>) {
        self.finish(attempt_id, now, |job| {
            job.status = JobStatus::Completed;
            job.scores = Some(scores);
            job.error = None;
        })
        .await;
    }

    pub async fn fail(&self, attempt_id: Uuid, error: String, now: DateTime<Utc>) {
        self.finish(attempt_id, now, |job| {
            job.status = JobStatus::Failed;
            job.error = Some(error);
        })
        .await;
    }

    async fn finish(&self, attempt_id: Uuid, now: DateTime<Utc>, update: impl FnOnce(&mut ScoringJob)) {
        let mut jobs = self.jobs.write().await;
        let job = jobs.entry(attempt_id).or_insert_with(|| ScoringJob {
            status: JobStatus::Processing,
            started_at: now,
            completed_at: None,
            scores: None,
            error: None,
            expires_at: now,
        });
        update(job);
        job.completed_at = Some(now);
        job.expires_at = now + self.ttl;
    }

    /// Unexpired job for an attempt
    pub async fn get(&self, attempt_id: Uuid, now: DateTime<Utc>) -> Option<ScoringJob> {
        self.jobs
            .read()
            .await
            .get(&attempt_id)
            .filter(|job| job.expires_at > now)
            .cloned()
    }

    /// Drop expired entries; returns how many were removed
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|_, job| job.expires_at > now);
        before - jobs.len()
    }

    /// Jobs still processing
    pub async fn in_flight(&self) -> usize {
        self.jobs
            .read()
            .await
            .values()
            .filter(|job| job.status == JobStatus::Processing)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pte_common::models::{Feedback, ScoreMeta, ScoreSource};

    fn scores() -> ScoreResult {
        ScoreResult {
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
                fallback_reason: None,
                raw: None,
            },
        }
    }

    #[tokio::test]
    async fn test_job_lifecycle() {
        let store = JobStore::new(Duration::seconds(60));
        let id = Uuid::new_v4();
        let t0 = Utc::now();

        store.start(id, t0).await;
        assert_eq!(store.in_flight().await, 1);
        assert_eq!(store.get(id, t0).await.unwrap().status, JobStatus::Processing);

        store.complete(id, scores(), t0 + Duration::seconds(2)).await;
        let job = store.get(id, t0 + Duration::seconds(2)).await.unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.started_at, t0);
        assert_eq!(job.scores.unwrap().total, 54);
        assert_eq!(store.in_flight().await, 0);
    }

    #[tokio::test]
    async fn test_jobs_expire_after_ttl() {
        let store = JobStore::new(Duration::seconds(10));
        let id = Uuid::new_v4();
        let t0 = Utc::now();

        store.start(id, t0).await;
        store.fail(id, "boom".to_string(), t0).await;

        let later = t0 + Duration::seconds(11);
        assert!(store.get(id, later).await.is_none());
        assert_eq!(store.purge_expired(later).await, 1);
        assert_eq!(store.purge_expired(later).await, 0);
    }
}
