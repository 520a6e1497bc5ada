//! Wall-clock timestamps
//!
//! Event timestamps are microseconds since the Unix epoch (UTC).

use time::OffsetDateTime;

/// Current time in microseconds since epoch
#[inline]
pub fn now_micros() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000) as i64
}

/// Current time in whole seconds since epoch
#[inline]
pub fn now_secs() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

/// Venue millisecond timestamp → microseconds
#[inline(always)]
pub const fn millis_to_micros(ms: i64) -> i64 {
    ms * 1_000
}
