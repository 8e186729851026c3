use chrono::{DateTime, Utc};
use std::cmp::Ordering;

/// Parse an RFC 3339 timestamp (the format SES uses) into UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Total ordering over optional event timestamps.
///
/// Missing timestamps come first, then unparseable ones (compared as strings), then
/// RFC 3339 timestamps by instant. Equal instants fall back to the raw string.
pub fn compare_occurred_at(a: Option<&str>, b: Option<&str>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => parse_timestamp(a)
            .cmp(&parse_timestamp(b))
            .then_with(|| a.cmp(b)),
    }
}

/// Format an optional timestamp for display, using '-' when missing.
pub fn format_occurred_at(ts: Option<&str>) -> String {
    ts.map(str::to_string).unwrap_or_else(|| "-".to_string())
}
