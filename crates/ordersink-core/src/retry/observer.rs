//! Per-attempt observation hook: log lines and counters, never decisions.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use super::error::DriverError;
use super::policy::ErrorKind;

/// What happened on one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    Failed { kind: ErrorKind, error: DriverError },
    /// The caller cancelled while this attempt was in flight.
    Cancelled,
}

/// One execution try of an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    /// 0-based attempt index.
    pub index: u32,
    pub outcome: AttemptOutcome,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
}

impl Attempt {
    pub fn error(&self) -> Option<&DriverError> {
        match &self.outcome {
            AttemptOutcome::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn is_retry(&self) -> bool {
        self.index > 0
    }
}

/// Sink invoked by the orchestrator exactly once per attempt.
///
/// Implementations must not fail; the orchestrator also shields itself from
/// panics raised here.
pub trait AttemptObserver: Send + Sync {
    fn record(&self, correlation_id: &Uuid, attempt: &Attempt);
}

impl<T: AttemptObserver + ?Sized> AttemptObserver for Arc<T> {
    fn record(&self, correlation_id: &Uuid, attempt: &Attempt) {
        (**self).record(correlation_id, attempt)
    }
}

impl<A: AttemptObserver, B: AttemptObserver> AttemptObserver for (A, B) {
    fn record(&self, correlation_id: &Uuid, attempt: &Attempt) {
        self.0.record(correlation_id, attempt);
        self.1.record(correlation_id, attempt);
    }
}

/// Default observer: one structured `tracing` event per attempt.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl AttemptObserver for TracingObserver {
    fn record(&self, correlation_id: &Uuid, attempt: &Attempt) {
        let elapsed_ms = attempt.elapsed.as_millis() as u64;
        match &attempt.outcome {
            AttemptOutcome::Success => tracing::debug!(
                correlation_id = %correlation_id,
                attempt = attempt.index,
                elapsed_ms,
                "order write succeeded"
            ),
            AttemptOutcome::Failed { kind, error } => tracing::warn!(
                correlation_id = %correlation_id,
                attempt = attempt.index,
                elapsed_ms,
                kind = kind.as_str(),
                error = %error,
                "query error for order"
            ),
            AttemptOutcome::Cancelled => tracing::info!(
                correlation_id = %correlation_id,
                attempt = attempt.index,
                elapsed_ms,
                "order write cancelled in flight"
            ),
        }
        if attempt.is_retry() {
            tracing::info!(
                correlation_id = %correlation_id,
                attempt = attempt.index,
                "order {} is being retried, attempt #{}",
                correlation_id,
                attempt.index
            );
        }
    }
}

/// Point-in-time copy of [`CountingObserver`] counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AttemptStats {
    pub attempts: u64,
    pub retried_attempts: u64,
    pub successes: u64,
    pub throttled: u64,
    pub timeouts: u64,
    pub unavailable: u64,
    pub other: u64,
    pub cancelled: u64,
}

/// Lock-free attempt counters shared across concurrent writes.
#[derive(Debug, Default)]
pub struct CountingObserver {
    attempts: AtomicU64,
    retried_attempts: AtomicU64,
    successes: AtomicU64,
    throttled: AtomicU64,
    timeouts: AtomicU64,
    unavailable: AtomicU64,
    other: AtomicU64,
    cancelled: AtomicU64,
}

impl CountingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> AttemptStats {
        let get = |c: &AtomicU64| c.load(Ordering::Relaxed);
        AttemptStats {
            attempts: get(&self.attempts),
            retried_attempts: get(&self.retried_attempts),
            successes: get(&self.successes),
            throttled: get(&self.throttled),
            timeouts: get(&self.timeouts),
            unavailable: get(&self.unavailable),
            other: get(&self.other),
            cancelled: get(&self.cancelled),
        }
    }
}

impl AttemptObserver for CountingObserver {
    fn record(&self, _correlation_id: &Uuid, attempt: &Attempt) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        if attempt.is_retry() {
            self.retried_attempts.fetch_add(1, Ordering::Relaxed);
        }
        let counter = match &attempt.outcome {
            AttemptOutcome::Success => &self.successes,
            AttemptOutcome::Cancelled => &self.cancelled,
            AttemptOutcome::Failed { kind, .. } => match kind {
                ErrorKind::Throttled { .. } => &self.throttled,
                ErrorKind::Timeout => &self.timeouts,
                ErrorKind::Unavailable => &self.unavailable,
                ErrorKind::Other => &self.other,
            },
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}
