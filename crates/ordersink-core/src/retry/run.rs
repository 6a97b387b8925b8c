//! Attempt loop: issue the write until it succeeds, the policy says stop, or
//! the caller cancels.

use chrono::Utc;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;
use tokio::time::Instant;

use super::classify::classify;
use super::error::WriteError;
use super::observer::{Attempt, AttemptObserver, AttemptOutcome, TracingObserver};
use super::policy::{RetryDecision, RetryPolicy};
use crate::config::RetryConfig;
use crate::control::CancelToken;
use crate::driver::WriteDriver;
use crate::operation::Operation;

/// Acknowledgement of a successful write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteReceipt {
    /// Attempts issued, including the successful one.
    pub attempts: u32,
    /// Wall time across all attempts and backoff sleeps.
    pub elapsed: Duration,
}

/// Drives one logical write through classify → observe → decide → sleep.
///
/// Holds no per-write state; one instance is shared by all concurrent writes.
#[derive(Debug)]
pub struct WriteOrchestrator<D, O = TracingObserver> {
    driver: D,
    /// `None` disables retrying: every write gets exactly one attempt.
    policy: Option<RetryPolicy>,
    observer: O,
}

impl<D: WriteDriver> WriteOrchestrator<D, TracingObserver> {
    pub fn new(driver: D, policy: Option<RetryPolicy>) -> Self {
        Self::with_observer(driver, policy, TracingObserver)
    }
}

impl<D: WriteDriver, O: AttemptObserver> WriteOrchestrator<D, O> {
    pub fn with_observer(driver: D, policy: Option<RetryPolicy>, observer: O) -> Self {
        Self {
            driver,
            policy,
            observer,
        }
    }

    /// Build from the `[retry]` config section; `enabled = false` drops the policy.
    pub fn from_config(driver: D, cfg: &RetryConfig, observer: O) -> Self {
        let policy = cfg.enabled.then(|| RetryPolicy::from(cfg));
        Self::with_observer(driver, policy, observer)
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn policy(&self) -> Option<&RetryPolicy> {
        self.policy.as_ref()
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    /// Run the write to completion without a cancellation signal.
    pub async fn execute(&self, op: &Operation) -> Result<WriteReceipt, WriteError> {
        self.execute_with(op, &CancelToken::new()).await
    }

    /// Run the write, aborting with `WriteError::Cancelled` as soon as `cancel`
    /// fires while awaiting the driver or sleeping between attempts.
    pub async fn execute_with(
        &self,
        op: &Operation,
        cancel: &CancelToken,
    ) -> Result<WriteReceipt, WriteError> {
        let started = Instant::now();
        let mut index = 0u32;
        loop {
            if cancel.is_cancelled() {
                return Err(WriteError::Cancelled { attempts: index });
            }

            let started_at = Utc::now();
            let attempt_start = Instant::now();
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                r = self.driver.write(op) => Some(r),
            };
            let elapsed = attempt_start.elapsed();
            let attempt = |outcome| Attempt {
                index,
                outcome,
                started_at,
                elapsed,
            };

            let error = match result {
                None => {
                    self.observe(op, &attempt(AttemptOutcome::Cancelled));
                    return Err(WriteError::Cancelled { attempts: index + 1 });
                }
                Some(Ok(())) => {
                    self.observe(op, &attempt(AttemptOutcome::Success));
                    return Ok(WriteReceipt {
                        attempts: index + 1,
                        elapsed: started.elapsed(),
                    });
                }
                Some(Err(e)) => e,
            };

            let kind = classify(&error);
            self.observe(
                op,
                &attempt(AttemptOutcome::Failed {
                    kind,
                    error: error.clone(),
                }),
            );

            let decision = match &self.policy {
                Some(policy) => policy.decide(kind, index, op),
                None => RetryDecision::NoRetry,
            };
            let delay = match decision {
                RetryDecision::NoRetry => {
                    return Err(WriteError::Failed {
                        kind,
                        source: error,
                        attempts: index + 1,
                    });
                }
                RetryDecision::RetryAfter(d) => d,
            };

            tracing::debug!(
                correlation_id = %op.correlation_id,
                attempt = index,
                kind = kind.as_str(),
                delay_ms = delay.as_millis() as u64,
                "backing off before retry"
            );
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(WriteError::Cancelled { attempts: index + 1 });
                }
                _ = tokio::time::sleep(delay) => {}
            }
            index += 1;
        }
    }

    fn observe(&self, op: &Operation, attempt: &Attempt) {
        let recorded = panic::catch_unwind(AssertUnwindSafe(|| {
            self.observer.record(&op.correlation_id, attempt)
        }));
        if recorded.is_err() {
            tracing::error!(
                correlation_id = %op.correlation_id,
                attempt = attempt.index,
                "attempt observer panicked; continuing"
            );
        }
    }
}
