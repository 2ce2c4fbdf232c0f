//! Timestamp utilities

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

/// Naive formats accepted for datetime fields, tried in order
const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Parse a datetime field value
///
/// Accepts RFC 3339 (with offset or `Z`) and naive ISO-like forms.
/// Naive values are interpreted as UTC.
pub fn parse_datetime(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Parse a datetime with one exact naive format, interpreted as UTC
pub fn parse_datetime_exact(value: &str, format: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value.trim(), format)
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Parse a `DD-MM-YYYY` query date
pub fn parse_day(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%d-%m-%Y").ok()
}

/// Inclusive UTC bounds of a whole day: 00:00:00 through 23:59:59
pub fn day_bounds(day: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = day.and_time(NaiveTime::MIN);
    let end = day.and_hms_opt(23, 59, 59).unwrap_or(start);
    (Utc.from_utc_datetime(&start), Utc.from_utc_datetime(&end))
}

/// Server-local wall clock stamp used in ingestion responses
pub fn response_stamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}
