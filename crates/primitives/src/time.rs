use std::time::{SystemTime, UNIX_EPOCH};

pub const DAY_MILLIS: i64 = 24 * 60 * 60 * 1000;

/// Milliseconds since the unix epoch, saturating on clocks set before it.
#[must_use]
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| {
            i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX)
        })
}
