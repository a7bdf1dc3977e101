//! Timestamp and calendar-day utilities
//!
//! Credit resets and study streaks are both counted in whole calendar days of
//! a single reference timezone (UTC), never in rolling 24-hour windows.

use chrono::{DateTime, Duration, NaiveDate, SecondsFormat, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Calendar day of a timestamp in the reference timezone
pub fn calendar_day(ts: DateTime<Utc>) -> NaiveDate {
    ts.date_naive()
}

/// Calendar day formatted as `YYYY-MM-DD` (sortable as text)
pub fn day_key(ts: DateTime<Utc>) -> String {
    calendar_day(ts).format("%Y-%m-%d").to_string()
}

/// Whole calendar days from `earlier` to `later` (negative if `later` is earlier)
pub fn days_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> i64 {
    (calendar_day(later) - calendar_day(earlier)).num_days()
}

/// Next midnight in the reference timezone strictly after `ts`
pub fn next_midnight(ts: DateTime<Utc>) -> DateTime<Utc> {
    let tomorrow = calendar_day(ts) + Duration::days(1);
    tomorrow
        .and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc())
        .unwrap_or(ts)
}

/// Format a timestamp for storage (RFC 3339, UTC, `Z` suffix)
pub fn to_db(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a stored RFC 3339 timestamp
pub fn from_db(value: &str) -> crate::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| crate::Error::Internal(format!("Failed to parse timestamp '{}': {}", value, e)))
}

/// Parse an optional stored timestamp
pub fn opt_from_db(value: Option<String>) -> crate::Result<Option<DateTime<Utc>>> {
    value.as_deref().map(from_db).transpose()
}
