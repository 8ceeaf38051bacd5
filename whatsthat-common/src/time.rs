//! Timestamp utilities

use chrono::{DateTime, Local, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Wall-clock time of day (`HH:MM:SS`, local timezone) for guest-facing displays
pub fn clock_display(timestamp: DateTime<Utc>) -> String {
    timestamp.with_timezone(&Local).format("%H:%M:%S").to_string()
}

/// Compact local timestamp used in archived message file names
pub fn file_stamp(timestamp: DateTime<Utc>) -> String {
    timestamp
        .with_timezone(&Local)
        .format("%Y%m%d_%H%M%S_%6f")
        .to_string()
}
