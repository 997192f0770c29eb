//! Timestamp utilities

use chrono::{DateTime, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Convert whole seconds to duration
pub fn secs_to_duration(secs: u64) -> std::time::Duration {
    std::time::Duration::from_secs(secs)
}

/// Seconds elapsed since `since`, clamped at zero
pub fn seconds_since(since: DateTime<Utc>) -> u64 {
    now().signed_duration_since(since).num_seconds().max(0) as u64
}
