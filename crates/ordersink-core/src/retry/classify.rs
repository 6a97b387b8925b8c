//! Classify raw driver errors into retry policy error kinds.

use std::time::Duration;

use super::error::{
    DriverError, CODE_OVERLOADED, CODE_READ_TIMEOUT, CODE_UNAVAILABLE, CODE_WRITE_TIMEOUT,
};
use super::policy::ErrorKind;

const THROTTLE_MARKERS: &[&str] = &[
    "toomanyrequests",
    "(429)",
    "request rate is large",
    "rate limit",
];
const TIMEOUT_MARKERS: &[&str] = &["timeout", "timed out"];
const UNAVAILABLE_MARKERS: &[&str] = &["unavailable", "no hosts available"];

/// Classify a driver error. Rules are checked in priority order:
/// throttling, then timeout, then unavailability; anything else is `Other`.
pub fn classify(e: &DriverError) -> ErrorKind {
    let message = e.message.to_ascii_lowercase();
    let has = |markers: &[&str]| markers.iter().any(|m| message.contains(m));

    if matches!(e.code, Some(CODE_OVERLOADED) | Some(429)) || has(THROTTLE_MARKERS) {
        let retry_after = e.retry_after.or_else(|| parse_retry_after_ms(&e.message));
        return ErrorKind::Throttled { retry_after };
    }
    if matches!(
        e.code,
        Some(CODE_WRITE_TIMEOUT) | Some(CODE_READ_TIMEOUT) | Some(408)
    ) || has(TIMEOUT_MARKERS)
    {
        return ErrorKind::Timeout;
    }
    if matches!(e.code, Some(CODE_UNAVAILABLE) | Some(503)) || has(UNAVAILABLE_MARKERS) {
        return ErrorKind::Unavailable;
    }
    ErrorKind::Other
}

/// Extract a `RetryAfterMs=<n>` hint embedded in a backend error message.
pub fn parse_retry_after_ms(message: &str) -> Option<Duration> {
    const KEY: &str = "retryafterms=";
    let lower = message.to_ascii_lowercase();
    let start = lower.find(KEY)? + KEY.len();
    let digits: String = lower[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse::<u64>().ok().map(Duration::from_millis)
}
