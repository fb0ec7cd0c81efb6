use chrono::Utc;

/// Milliseconds since the unix epoch, as stamped on `_modified`.
#[inline]
pub fn current_time_millis() -> i64 {
    Utc::now().timestamp_millis()
}
