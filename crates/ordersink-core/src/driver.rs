//! Boundary to the database client: one call per write attempt.

use async_trait::async_trait;
use std::sync::Arc;

use crate::operation::Operation;
use crate::retry::DriverError;

/// Executes a single write attempt against the backend.
///
/// Implementations do no retrying of their own; they report the raw failure
/// and leave the decision to the orchestrator.
#[async_trait]
pub trait WriteDriver: Send + Sync {
    async fn write(&self, op: &Operation) -> Result<(), DriverError>;
}

#[async_trait]
impl<T: WriteDriver + ?Sized> WriteDriver for Arc<T> {
    async fn write(&self, op: &Operation) -> Result<(), DriverError> {
        (**self).write(op).await
    }
}
