//! Utility functions for time handling, string manipulation, and file system operations.
//!
//! This module provides helper functions used throughout the application:
//! - Clock helpers that normalise "now" and convert to epoch seconds
//! - Lenient parsing of the schedule API's date strings (always UTC)
//! - String truncation for logging
//! - File system validation for output directories

use chrono::{DateTime, NaiveDateTime, SubsecRound, TimeZone, Utc};
use std::error::Error;
use std::fs as stdfs;
use tokio::fs;
use tracing::{info, instrument};

/// Current UTC time truncated to whole seconds.
pub fn clean_now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}

/// Epoch seconds as a float, the unit stored in cache files.
pub fn epoch_secs(dt: DateTime<Utc>) -> f64 {
    dt.timestamp_millis() as f64 / 1000.0
}

/// Parse a schedule date string as UTC.
///
/// Accepts RFC 3339 (any offset, converted to UTC), naive ISO-like forms
/// (`2025-05-06T19:00`, `2025-05-06T19:00:00.000`, `2025-05-06 19:00:00`),
/// which are taken to be UTC, and bare epoch seconds or milliseconds.
///
/// # Examples
///
/// ```ignore
/// assert!(parse_utc("2025-05-06T19:00:00Z").is_some());
/// assert!(parse_utc("not a date").is_none());
/// ```
pub fn parse_utc(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    const NAIVE_FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ];
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    // Epoch values; 13+ digits are milliseconds.
    if let Ok(n) = raw.parse::<i64>() {
        return if n.abs() >= 1_000_000_000_000 {
            Utc.timestamp_millis_opt(n).single()
        } else {
            Utc.timestamp_opt(n, 0).single()
        };
    }

    None
}

/// Truncate a string for logging purposes.
///
/// Long strings are truncated to `max` bytes (backing off to a character
/// boundary) with an ellipsis and byte count indicator appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// Ensure a directory exists and is writable.
///
/// This function creates the directory if it doesn't exist, then performs
/// a write test by creating and immediately deleting a scratch file.
///
/// # Errors
///
/// Returns an error if:
/// - The directory cannot be created
/// - The directory is not writable (permission denied, read-only filesystem, etc.)
#[instrument(level = "info", skip_all, fields(path = %path))]
pub async fn ensure_writable_dir(path: &str) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(path).await?;
    let scratch_path = format!("{}/..__write_check__", path.trim_end_matches('/'));
    match stdfs::File::create(&scratch_path) {
        Ok(_) => {
            let _ = stdfs::remove_file(&scratch_path);
            info!("Directory is writable");
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_truncate_for_log_short_string() {
        assert_eq!(truncate_for_log("Hello, world!", 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }

    #[test]
    fn test_truncate_for_log_multibyte() {
        let result = truncate_for_log("ééé", 3);
        assert!(result.starts_with('é'));
    }

    #[test]
    fn test_clean_now_has_no_subseconds() {
        assert_eq!(clean_now().nanosecond(), 0);
    }

    #[test]
    fn test_parse_utc_rfc3339_with_offset() {
        let dt = parse_utc("2025-05-06T21:00:00+02:00").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2025, 5, 6, 19, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_utc_naive_forms() {
        let expected = Utc.with_ymd_and_hms(2025, 5, 6, 19, 0, 0).unwrap();
        assert_eq!(parse_utc("2025-05-06T19:00:00.000").unwrap(), expected);
        assert_eq!(parse_utc("2025-05-06T19:00").unwrap(), expected);
        assert_eq!(parse_utc("2025-05-06 19:00:00").unwrap(), expected);
    }

    #[test]
    fn test_parse_utc_epoch() {
        let expected = Utc.with_ymd_and_hms(2025, 5, 6, 19, 0, 0).unwrap();
        assert_eq!(parse_utc("1746558000").unwrap(), expected);
        assert_eq!(parse_utc("1746558000000").unwrap(), expected);
    }

    #[test]
    fn test_parse_utc_rejects_garbage() {
        assert!(parse_utc("").is_none());
        assert!(parse_utc("tomorrow-ish").is_none());
    }

    #[test]
    fn test_epoch_secs() {
        let dt = Utc.with_ymd_and_hms(2025, 5, 6, 19, 0, 0).unwrap();
        assert_eq!(epoch_secs(dt), 1_746_558_000.0);
    }
}
