//! Credit/Quota Manager
//!
//! Gates oracle-backed scoring by a per-user daily allowance. The ledger
//! row is the only shared counter: resets happen lazily on access, and a
//! deduction is a single guarded UPDATE so concurrent sessions cannot
//! overspend the same day's budget.

use chrono::{DateTime, Duration, Utc};
use pte_common::time::{calendar_day, next_midnight, now};
use pte_common::Result;
use serde::Serialize;
use sqlx::SqlitePool;
use std::future::Future;

use crate::db::credits as ledger;
use crate::error::{ScoringError, ScoringResult};

/// Question types graded by simple equality/set checks; never charged
pub const FREE_QUESTION_TYPES: &[&str] = &[
    "multiple_choice_single",
    "multiple_choice_multiple",
    "reorder_paragraphs",
    "fill_in_blanks",
    "reading_writing_fill_blanks",
    "highlight_correct_summary",
    "select_missing_word",
];

/// Credits charged for one non-free scoring request
pub const CREDITS_PER_REQUEST: u32 = 1;

/// Stored value meaning "no daily limit"
const UNLIMITED: i64 = -1;

/// Daily allowance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Allotment {
    Limited(u32),
    Unlimited,
}

impl Allotment {
    pub fn from_db(value: i64) -> Self {
        if value < 0 {
            Allotment::Unlimited
        } else {
            Allotment::Limited(value.min(i64::from(u32::MAX)) as u32)
        }
    }

    pub fn to_db(self) -> i64 {
        match self {
            Allotment::Limited(n) => i64::from(n),
            Allotment::Unlimited => UNLIMITED,
        }
    }
}

/// Credit boundary response
///
/// `total`, `remaining` and `resets_at` are absent for unlimited ledgers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditStatus {
    pub total: Option<u32>,
    pub used: u32,
    pub remaining: Option<u32>,
    pub resets_at: Option<DateTime<Utc>>,
    pub unlimited: bool,
}

/// Result of `can_use`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreditCheck {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// One day's usage
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyUsage {
    pub date: String,
    pub used: u32,
}

/// Usage summary over a window of days
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageStats {
    pub total_used: u32,
    pub average_per_day: f64,
    pub peak_day: Option<DailyUsage>,
    pub history: Vec<DailyUsage>,
}

/// Per-user daily credit ledger manager
#[derive(Clone)]
pub struct CreditManager {
    pool: SqlitePool,
    default_allotment: Allotment,
}

impl CreditManager {
    pub fn new(pool: SqlitePool, default_allotment: Allotment) -> Self {
        Self {
            pool,
            default_allotment,
        }
    }

    pub fn default_allotment(&self) -> Allotment {
        self.default_allotment
    }

    /// Credits needed for a question type (0 for free types)
    pub fn credits_needed(question_type: &str) -> u32 {
        if Self::is_free(question_type) {
            0
        } else {
            CREDITS_PER_REQUEST
        }
    }

    pub fn is_free(question_type: &str) -> bool {
        FREE_QUESTION_TYPES.contains(&question_type)
    }

    pub async fn status(&self, user_id: &str) -> Result<CreditStatus> {
        self.status_at(user_id, now()).await
    }

    /// Current status as seen at `now`, applying the lazy daily reset
    pub async fn status_at(&self, user_id: &str, now: DateTime<Utc>) -> Result<CreditStatus> {
        ledger::ensure_ledger(&self.pool, user_id, self.default_allotment.to_db(), now).await?;
        if ledger::reset_if_new_day(&self.pool, user_id, now).await? {
            tracing::debug!(user_id, "Daily credits reset");
        }

        let row = ledger::get_ledger(&self.pool, user_id)
            .await?
            .ok_or_else(|| pte_common::Error::NotFound(format!("credit ledger for {}", user_id)))?;

        let used = row.used_today.max(0) as u32;
        Ok(match Allotment::from_db(row.daily_allotment) {
            Allotment::Unlimited => CreditStatus {
                total: None,
                used,
                remaining: None,
                resets_at: None,
                unlimited: true,
            },
            Allotment::Limited(total) => CreditStatus {
                total: Some(total),
                used,
                remaining: Some(total.saturating_sub(used)),
                resets_at: Some(next_midnight(now)),
                unlimited: false,
            },
        })
    }

    pub async fn can_use(&self, user_id: &str, question_type: &str) -> Result<CreditCheck> {
        self.can_use_at(user_id, question_type, now()).await
    }

    pub async fn can_use_at(&self, user_id: &str, question_type: &str, now: DateTime<Utc>) -> Result<CreditCheck> {
        let needed = Self::credits_needed(question_type);
        if needed == 0 {
            return Ok(CreditCheck {
                allowed: true,
                reason: None,
            });
        }

        let status = self.status_at(user_id, now).await?;
        match status.remaining {
            None => Ok(CreditCheck {
                allowed: true,
                reason: None,
            }),
            Some(remaining) if remaining >= needed => Ok(CreditCheck {
                allowed: true,
                reason: None,
            }),
            Some(remaining) => Ok(CreditCheck {
                allowed: false,
                reason: Some(format!(
                    "Not enough AI credits. You have {} remaining. Resets at {}.",
                    remaining,
                    reset_time_label(status.resets_at)
                )),
            }),
        }
    }

    pub async fn deduct(&self, user_id: &str, count: u32) -> Result<bool> {
        self.deduct_at(user_id, count, now()).await
    }

    /// Atomically take `count` credits; false (and no change) if that would overspend
    pub async fn deduct_at(&self, user_id: &str, count: u32, now: DateTime<Utc>) -> Result<bool> {
        if count == 0 {
            return Ok(true);
        }
        ledger::ensure_ledger(&self.pool, user_id, self.default_allotment.to_db(), now).await?;
        let deducted = ledger::try_deduct(&self.pool, user_id, count, now).await?;

        if deducted {
            tracing::debug!(user_id, count, "Credits deducted");
        } else {
            tracing::info!(user_id, count, "Credit deduction refused: allotment exhausted");
        }
        Ok(deducted)
    }

    pub async fn with_credit_check<F, Fut, T>(
        &self,
        user_id: &str,
        question_type: &str,
        operation: F,
    ) -> ScoringResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ScoringResult<T>>,
    {
        self.with_credit_check_at(user_id, question_type, now(), operation)
            .await
    }

    /// Check, reserve, then run `operation`, all as of `now`
    ///
    /// The credit is taken before `operation` runs and is not refunded if
    /// the operation later degrades.
    pub async fn with_credit_check_at<F, Fut, T>(
        &self,
        user_id: &str,
        question_type: &str,
        now: DateTime<Utc>,
        operation: F,
    ) -> ScoringResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ScoringResult<T>>,
    {
        let check = self.can_use_at(user_id, question_type, now).await?;
        if !check.allowed {
            return Err(self.quota_error(user_id, check.reason, now).await);
        }

        let needed = Self::credits_needed(question_type);
        if needed > 0 && !self.deduct_at(user_id, needed, now).await? {
            // Lost a race with a concurrent request between check and deduct
            return Err(self.quota_error(user_id, None, now).await);
        }

        operation().await
    }

    async fn quota_error(&self, user_id: &str, reason: Option<String>, now: DateTime<Utc>) -> ScoringError {
        let status = self.status_at(user_id, now).await.ok();
        let resets_at = status.as_ref().and_then(|s| s.resets_at);
        ScoringError::QuotaExceeded {
            remaining: status.as_ref().and_then(|s| s.remaining),
            resets_at,
            reason: reason.unwrap_or_else(|| {
                format!(
                    "Not enough AI credits. Resets at {}.",
                    reset_time_label(resets_at)
                )
            }),
        }
    }

    /// Change a user's daily allowance (tier change)
    pub async fn set_allotment(&self, user_id: &str, allotment: Allotment) -> Result<()> {
        ledger::ensure_ledger(&self.pool, user_id, self.default_allotment.to_db(), now()).await?;
        ledger::set_allotment(&self.pool, user_id, allotment.to_db()).await?;
        tracing::info!(user_id, allotment = ?allotment, "Credit allotment changed");
        Ok(())
    }

    pub async fn usage_stats(&self, user_id: &str, days: u32) -> Result<UsageStats> {
        self.usage_stats_at(user_id, days, now()).await
    }

    /// Usage over the last `days` calendar days, including today
    pub async fn usage_stats_at(&self, user_id: &str, days: u32, now: DateTime<Utc>) -> Result<UsageStats> {
        let days = days.max(1);
        let since = calendar_day(now) - Duration::days(i64::from(days) - 1);
        let since = since.format("%Y-%m-%d").to_string();

        let history: Vec<DailyUsage> = ledger::usage_by_day(&self.pool, user_id, &since)
            .await?
            .into_iter()
            .map(|(date, used)| DailyUsage { date, used })
            .collect();

        let total_used: u32 = history.iter().map(|d| d.used).sum();
        let peak_day = history
            .iter()
            .fold(None::<&DailyUsage>, |best, day| match best {
                Some(b) if b.used >= day.used => Some(b),
                _ => Some(day),
            })
            .cloned();

        Ok(UsageStats {
            total_used,
            average_per_day: f64::from(total_used) / f64::from(days),
            peak_day,
            history,
        })
    }
}

fn reset_time_label(resets_at: Option<DateTime<Utc>>) -> String {
    resets_at
        .map(|t| t.format("%H:%M UTC").to_string())
        .unwrap_or_else(|| "midnight UTC".to_string())
}

/// Human-readable status line for presentation layers
pub fn status_message(status: &CreditStatus) -> String {
    match (status.total, status.remaining) {
        (Some(total), Some(remaining)) => {
            if remaining == 0 {
                format!("No AI credits remaining. Resets at {}", reset_time_label(status.resets_at))
            } else {
                format!("{} of {} AI credits remaining today", remaining, total)
            }
        }
        _ => "Unlimited AI scoring available".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_free_types() {
        assert!(CreditManager::is_free("multiple_choice_single"));
        assert!(CreditManager::is_free("select_missing_word"));
        assert!(!CreditManager::is_free("read_aloud"));
        assert!(!CreditManager::is_free("write_essay"));
        assert_eq!(CreditManager::credits_needed("reorder_paragraphs"), 0);
        assert_eq!(CreditManager::credits_needed("describe_image"), 1);
    }

    #[test]
    fn test_allotment_db_mapping() {
        assert_eq!(Allotment::from_db(-1), Allotment::Unlimited);
        assert_eq!(Allotment::from_db(4), Allotment::Limited(4));
        assert_eq!(Allotment::Unlimited.to_db(), -1);
    }

    #[test]
    fn test_status_messages() {
        let midnight = Utc.with_ymd_and_hms(2025, 5, 2, 0, 0, 0).unwrap();
        let limited = |remaining| CreditStatus {
            total: Some(4),
            used: 4 - remaining,
            remaining: Some(remaining),
            resets_at: Some(midnight),
            unlimited: false,
        };

        assert_eq!(status_message(&limited(3)), "3 of 4 AI credits remaining today");
        assert_eq!(status_message(&limited(0)), "No AI credits remaining. Resets at 00:00 UTC");
        assert_eq!(
            status_message(&CreditStatus {
                total: None,
                used: 12,
                remaining: None,
                resets_at: None,
                unlimited: true,
            }),
            "Unlimited AI scoring available"
        );
    }
}
