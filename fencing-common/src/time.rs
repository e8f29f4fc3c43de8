//! Timestamp utilities
//!
//! The wearable transport carries wall-clock time as floating-point seconds
//! since the UNIX epoch; session artifacts store seconds relative to the start
//! of the recording.

use chrono::{DateTime, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Convert a UTC timestamp to fractional seconds since the UNIX epoch
pub fn to_unix_seconds(timestamp: DateTime<Utc>) -> f64 {
    timestamp.timestamp() as f64 + f64::from(timestamp.timestamp_subsec_nanos()) / 1e9
}

/// Current wall-clock time as fractional UNIX seconds
pub fn now_unix_seconds() -> f64 {
    to_unix_seconds(now())
}

/// Seconds elapsed between `start` and an absolute UNIX-seconds timestamp
///
/// Negative when the timestamp predates `start` (clock skew between devices).
pub fn seconds_since(start: DateTime<Utc>, absolute_unix_seconds: f64) -> f64 {
    absolute_unix_seconds - to_unix_seconds(start)
}
