use rand::Rng;
use std::time::Duration;

use crate::config::RetryConfig;
use crate::operation::Operation;

/// High-level classification of a driver failure for retry purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Backend rejected the write for exceeding provisioned throughput.
    /// Carries the server-suggested wait when one was attached.
    Throttled { retry_after: Option<Duration> },
    /// No response within the client or server deadline.
    Timeout,
    /// No coordinator or replica could serve the write.
    Unavailable,
    /// Anything unclassified (never retried).
    Other,
}

impl ErrorKind {
    /// Short stable label for logs and summaries.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Throttled { .. } => "throttled",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Unavailable => "unavailable",
            ErrorKind::Other => "other",
        }
    }
}

/// Decision returned by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Do not retry this error.
    NoRetry,
    /// Retry after the given delay.
    RetryAfter(Duration),
}

impl RetryDecision {
    pub fn should_retry(&self) -> bool {
        matches!(self, RetryDecision::RetryAfter(_))
    }

    /// Delay before the next attempt; zero when not retrying.
    pub fn delay(&self) -> Duration {
        match self {
            RetryDecision::NoRetry => Duration::ZERO,
            RetryDecision::RetryAfter(d) => *d,
        }
    }
}

/// Exponential backoff policy with jitter, a ceiling and an absolute retry cap.
///
/// The policy holds no per-operation state: the attempt index is passed in on
/// every call, so a single instance can be shared by any number of
/// concurrent writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed beyond the first attempt.
    pub max_retries: u32,
    /// Base delay for backoff; also the upper bound of the jitter term.
    pub base_delay: Duration,
    /// Upper bound on the exponential part of the delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(cfg: &RetryConfig) -> Self {
        Self {
            max_retries: cfg.max_retries,
            base_delay: Duration::from_millis(cfg.base_delay_ms),
            max_delay: Duration::from_millis(cfg.max_delay_ms),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    /// Decide whether attempt `attempt` (0-based) should be followed by another.
    pub fn decide(&self, kind: ErrorKind, attempt: u32, op: &Operation) -> RetryDecision {
        if attempt >= self.max_retries {
            return RetryDecision::NoRetry;
        }

        match kind {
            ErrorKind::Other => RetryDecision::NoRetry,
            // Server hint is authoritative: no jitter, no ceiling.
            ErrorKind::Throttled {
                retry_after: Some(hint),
            } => RetryDecision::RetryAfter(hint),
            ErrorKind::Throttled { retry_after: None } | ErrorKind::Unavailable => {
                RetryDecision::RetryAfter(self.backoff(attempt, self.jitter()))
            }
            // A timed-out write may have been applied; only resend when that is harmless.
            ErrorKind::Timeout if op.idempotent => {
                RetryDecision::RetryAfter(self.backoff(attempt, self.jitter()))
            }
            ErrorKind::Timeout => RetryDecision::NoRetry,
        }
    }

    /// Backoff for `attempt` with an explicit jitter term:
    /// `min(base * 2^attempt, max_delay) + jitter`.
    pub fn backoff(&self, attempt: u32, jitter: Duration) -> Duration {
        let exp = 1u32 << attempt.min(16);
        let raw = self.base_delay.saturating_mul(exp);
        raw.min(self.max_delay).saturating_add(jitter)
    }

    /// Uniform jitter in `[0, base_delay)`.
    fn jitter(&self) -> Duration {
        let base = self.base_delay.as_micros().min(u64::MAX as u128) as u64;
        if base == 0 {
            return Duration::ZERO;
        }
        Duration::from_micros(rand::thread_rng().gen_range(0..base))
    }
}
