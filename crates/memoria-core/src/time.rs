use chrono::{DateTime, Duration, Utc};

pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

/// RFC3339 timestamp `days` before now — used as the lower bound of a
/// time-windowed search.
pub fn now_rfc3339_minus_days(days: i64) -> String {
    (Utc::now() - Duration::days(days)).to_rfc3339()
}

pub fn parse_rfc3339(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.with_timezone(&Utc))
}

/// Seconds elapsed since an RFC3339 timestamp. Returns 0 on parse failure
/// rather than panicking — a malformed timestamp should never block a flush.
pub fn seconds_since(rfc3339: &str) -> i64 {
    match parse_rfc3339(rfc3339) {
        Some(dt) => Utc::now().signed_duration_since(dt).num_seconds(),
        None => 0,
    }
}
