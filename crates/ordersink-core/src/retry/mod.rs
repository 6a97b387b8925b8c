//! Retry and backoff engine.
//!
//! This module encapsulates error classification (throttling, timeouts,
//! unavailable replicas), the stateless backoff decision, the per-attempt
//! observer hook and the attempt loop that ties them together, so that the
//! HTTP endpoint and the load generator share one consistent policy.

mod classify;
mod error;
mod observer;
mod policy;
mod run;

pub use classify::{classify, parse_retry_after_ms};
pub use error::{
    DriverError, WriteError, CODE_OVERLOADED, CODE_READ_TIMEOUT, CODE_UNAVAILABLE,
    CODE_WRITE_TIMEOUT,
};
pub use observer::{
    Attempt, AttemptObserver, AttemptOutcome, AttemptStats, CountingObserver, TracingObserver,
};
pub use policy::{ErrorKind, RetryDecision, RetryPolicy};
pub use run::{WriteOrchestrator, WriteReceipt};
