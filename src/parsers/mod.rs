//! Parsers turning raw session artifacts into typed event streams.
//!
//! All three parsers share the same tolerance contract: a malformed line is
//! logged and skipped, never fatal. A parse always completes and returns a
//! (possibly degraded) result.

pub mod selenium_logs;
pub mod session_logs;
pub mod text_logs;

use chrono::{FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;

/// Sentinel for "not measurable": summary consumers render `-1` as n/a.
/// Keeps every percentage/average field a plain number, never NaN.
pub const SENTINEL: i64 = -1;

pub fn or_sentinel(value: Option<i64>) -> i64 {
    value.unwrap_or(SENTINEL)
}

/// Percentage with a zero-guarded denominator.
pub fn percentage(value: i64, denominator: i64) -> f64 {
    if denominator <= 0 {
        return SENTINEL as f64;
    }
    (value as f64) * 100.0 / (denominator as f64)
}

/// Per-exchange average with a zero-guarded count.
pub fn average(total: i64, count: usize) -> f64 {
    if count == 0 {
        return SENTINEL as f64;
    }
    total as f64 / count as f64
}

/// Parse a `YYYY-MM-DD HH:MM:SS:mmm` log timestamp into epoch milliseconds
/// (assumed UTC). The millisecond separator varies across log producers, so
/// both `:` and `.` are accepted, as is a bare seconds field.
pub fn parse_timestamp_ms(date: &str, time: &str) -> Option<i64> {
    let combined = format!("{date} {time}");
    const FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S:%3f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
    ];
    for format in FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(&combined, format) {
            return Some(dt.and_utc().timestamp_millis());
        }
    }
    None
}

/// Parse a bare time-of-day token (`10:15:51.716`).
pub fn parse_time_of_day(time: &str) -> Option<NaiveTime> {
    const FORMATS: &[&str] = &["%H:%M:%S%.f", "%H:%M:%S:%3f", "%H:%M:%S"];
    for format in FORMATS {
        if let Ok(t) = NaiveTime::parse_from_str(time, format) {
            return Some(t);
        }
    }
    None
}

/// Epoch milliseconds of a local date + time under a fixed UTC offset.
pub fn epoch_ms_with_offset(date: NaiveDate, time: NaiveTime, offset: FixedOffset) -> i64 {
    date.and_time(time)
        .and_local_timezone(offset)
        .single()
        .map(|dt| dt.timestamp_millis())
        .unwrap_or(0)
}

/// Aggregate timing and pass/fail statistics for one parsed log.
///
/// Invariants: `execution_time = in_time + out_time`;
/// `setup_time = session_duration - execution_time`; every `_perc` and
/// `average_*` field is either a real value or the `-1` sentinel.
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub total_requests: usize,
    pub session_started_at: i64,
    pub session_completed_at: i64,
    pub session_duration: i64,
    pub setup_time: i64,
    pub execution_time: i64,
    pub in_time: i64,
    pub out_time: i64,
    pub passed_requests: usize,
    pub failed_requests: usize,
    pub unknown_requests: usize,
    pub log_length: usize,
    pub setup_time_perc: f64,
    pub in_time_perc: f64,
    pub out_time_perc: f64,
    pub average_cycle_time: f64,
    pub average_serve_time: f64,
    pub average_wait_time: f64,
    pub passed_perc: f64,
    pub failed_perc: f64,
    pub unknown_perc: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timestamp_colon_millis() {
        let ms = parse_timestamp_ms("2024-05-14", "10:22:33:123").unwrap();
        assert_eq!(ms % 1000, 123);
    }

    #[test]
    fn test_parse_timestamp_dot_millis() {
        assert!(parse_timestamp_ms("2024-05-14", "10:22:33.500").is_some());
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage() {
        assert!(parse_timestamp_ms("not-a-date", "nope").is_none());
    }

    #[test]
    fn test_percentage_zero_denominator_is_sentinel() {
        assert_eq!(percentage(5, 0), -1.0);
    }

    #[test]
    fn test_percentage_plain() {
        assert_eq!(percentage(1, 4), 25.0);
    }

    #[test]
    fn test_epoch_with_offset() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 14).unwrap();
        let time = parse_time_of_day("12:00:00").unwrap();
        let utc = FixedOffset::east_opt(0).unwrap();
        let ist = FixedOffset::east_opt(5 * 3600 + 1800).unwrap();
        let diff = epoch_ms_with_offset(date, time, utc) - epoch_ms_with_offset(date, time, ist);
        // +05:30 wall clock corresponds to an earlier UTC instant
        assert_eq!(diff, (5 * 3600 + 1800) * 1000);
    }
}
