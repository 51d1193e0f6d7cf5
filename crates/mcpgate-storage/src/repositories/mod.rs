//! Repository implementations using SQLite.

mod backend_repository;
mod request_log_repository;

pub use backend_repository::SqliteBackendRepository;
pub use request_log_repository::SqliteRequestLogRepository;

use chrono::{DateTime, Utc};

/// Parse a stored datetime string to DateTime<Utc>.
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    // Try RFC3339 first
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    // Try SQLite datetime format
    if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return dt.and_utc();
    }
    Utc::now()
}

/// Timestamps are stored with fixed-width fractional seconds so that
/// lexical order matches chronological order.
pub(crate) fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}
