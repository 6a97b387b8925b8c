//! Raw driver failures and terminal write errors.

use std::time::Duration;
use thiserror::Error;

use super::policy::ErrorKind;

/// Protocol error code: coordinator had too few live replicas.
pub const CODE_UNAVAILABLE: i32 = 0x1000;
/// Protocol error code: coordinator is overloaded (throughput exceeded).
pub const CODE_OVERLOADED: i32 = 0x1001;
/// Protocol error code: write timed out waiting for replicas.
pub const CODE_WRITE_TIMEOUT: i32 = 0x1100;
/// Protocol error code: read timed out waiting for replicas.
pub const CODE_READ_TIMEOUT: i32 = 0x1200;

/// Error returned by a single write attempt at the driver boundary.
/// Kept raw so the classifier can inspect it before a retry decision.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct DriverError {
    /// Human-readable message as reported by the backend or client.
    pub message: String,
    /// Protocol or HTTP-like status code, when the driver exposes one.
    pub code: Option<i32>,
    /// Wait interval suggested by the backend, if any.
    pub retry_after: Option<Duration>,
}

impl DriverError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            retry_after: None,
        }
    }

    pub fn with_code(mut self, code: i32) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }
}

/// Terminal outcome of a write that did not succeed.
#[derive(Debug, Error)]
pub enum WriteError {
    /// The last attempt failed and the policy said stop (or retries are disabled).
    #[error("write failed after {attempts} attempt(s): {source}")]
    Failed {
        kind: ErrorKind,
        #[source]
        source: DriverError,
        attempts: u32,
    },
    /// The caller cancelled the write or its deadline passed.
    #[error("write cancelled after {attempts} attempt(s)")]
    Cancelled { attempts: u32 },
}

impl WriteError {
    /// Number of attempts issued to the driver before giving up.
    pub fn attempts_made(&self) -> u32 {
        match self {
            WriteError::Failed { attempts, .. } | WriteError::Cancelled { attempts } => *attempts,
        }
    }

    /// Classified kind of the last failure; `None` when cancelled.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            WriteError::Failed { kind, .. } => Some(*kind),
            WriteError::Cancelled { .. } => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, WriteError::Cancelled { .. })
    }

    /// HTTP-equivalent status a transport should answer with.
    pub fn status_code(&self) -> u16 {
        match self.kind() {
            Some(ErrorKind::Throttled { .. }) => 429,
            Some(ErrorKind::Timeout) => 408,
            _ => 500,
        }
    }
}
