//! Write cancellation: per-write cancel tokens and a registry of in-flight writes.
//!
//! A caller hands a `CancelToken` to the orchestrator; cancelling it (or
//! letting its deadline pass) makes the attempt loop stop at its next
//! suspension point. The server registers every in-flight write with
//! `WriteControl` so shutdown can cancel them all.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::Notify;
use tokio::time::Instant;
use uuid::Uuid;

#[derive(Debug, Default)]
struct TokenState {
    cancelled: AtomicBool,
    notify: Notify,
    deadline: Option<Instant>,
}

/// Cloneable cancellation signal, optionally bounded by a deadline.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<TokenState>,
}

impl CancelToken {
    /// A token that only fires when `cancel` is called.
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that also fires once `deadline` passes.
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            inner: Arc::new(TokenState {
                deadline: Some(deadline),
                ..TokenState::default()
            }),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::Release);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
            || self.inner.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Resolves once the token is cancelled or its deadline passes.
    pub async fn cancelled(&self) {
        let notified = self.inner.notify.notified();
        tokio::pin!(notified);
        // Register before checking the flag so a concurrent `cancel` is not missed.
        notified.as_mut().enable();
        if self.inner.cancelled.load(Ordering::Acquire) {
            return;
        }
        match self.inner.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = notified => {}
                    _ = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => notified.await,
        }
    }
}

/// Registry of in-flight writes keyed by correlation id.
#[derive(Debug, Default)]
pub struct WriteControl {
    writes: RwLock<HashMap<Uuid, CancelToken>>,
}

/// Keeps a write registered; unregisters it when dropped.
#[derive(Debug)]
pub struct RegisteredWrite<'a> {
    control: &'a WriteControl,
    id: Uuid,
    token: CancelToken,
}

impl RegisteredWrite<'_> {
    pub fn token(&self) -> &CancelToken {
        &self.token
    }
}

impl Drop for RegisteredWrite<'_> {
    fn drop(&mut self) {
        self.control.unregister(&self.id);
    }
}

impl WriteControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a write; the returned guard carries its token and unregisters on drop.
    pub fn register(&self, id: Uuid, deadline: Option<Instant>) -> RegisteredWrite<'_> {
        let token = match deadline {
            Some(d) => CancelToken::with_deadline(d),
            None => CancelToken::new(),
        };
        self.writes
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, token.clone());
        RegisteredWrite {
            control: self,
            id,
            token,
        }
    }

    fn unregister(&self, id: &Uuid) {
        self.writes
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(id);
    }

    /// Cancel one write. Returns false if it is not (or no longer) in flight.
    pub fn cancel(&self, id: &Uuid) -> bool {
        match self
            .writes
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
        {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel every in-flight write; returns how many were signalled.
    pub fn cancel_all(&self) -> usize {
        let writes = self.writes.read().unwrap_or_else(|e| e.into_inner());
        for token in writes.values() {
            token.cancel();
        }
        writes.len()
    }

    pub fn in_flight(&self) -> usize {
        self.writes.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}
