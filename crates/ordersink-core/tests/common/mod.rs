//! Test doubles for the driver boundary and the attempt observer.

#![allow(dead_code)]

use async_trait::async_trait;
use ordersink_core::driver::WriteDriver;
use ordersink_core::operation::Operation;
use ordersink_core::retry::{Attempt, AttemptObserver, DriverError, CODE_OVERLOADED};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

/// One scripted driver response.
#[derive(Debug, Clone)]
pub enum Step {
    Ok,
    Fail(DriverError),
    /// Never completes; only cancellation gets the caller out.
    Hang,
}

/// Driver that replays a fixed script, then repeats `rest` forever.
pub struct ScriptedDriver {
    script: Mutex<VecDeque<Step>>,
    rest: Step,
    calls: AtomicU32,
}

impl ScriptedDriver {
    pub fn new(script: Vec<Step>, rest: Step) -> Self {
        Self {
            script: Mutex::new(script.into()),
            rest,
            calls: AtomicU32::new(0),
        }
    }

    /// Fails with `err` on every call.
    pub fn always(err: DriverError) -> Self {
        Self::new(Vec::new(), Step::Fail(err))
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WriteDriver for ScriptedDriver {
    async fn write(&self, _op: &Operation) -> Result<(), DriverError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.rest.clone());
        match step {
            Step::Ok => Ok(()),
            Step::Fail(e) => Err(e),
            Step::Hang => std::future::pending().await,
        }
    }
}

/// Observer that keeps every attempt it sees.
#[derive(Default)]
pub struct RecordingObserver {
    seen: Mutex<Vec<(Uuid, Attempt)>>,
}

impl RecordingObserver {
    pub fn attempts(&self) -> Vec<Attempt> {
        self.seen.lock().unwrap().iter().map(|(_, a)| a.clone()).collect()
    }

    pub fn indices(&self) -> Vec<u32> {
        self.attempts().iter().map(|a| a.index).collect()
    }

    pub fn correlation_ids(&self) -> Vec<Uuid> {
        self.seen.lock().unwrap().iter().map(|(id, _)| *id).collect()
    }
}

impl AttemptObserver for RecordingObserver {
    fn record(&self, correlation_id: &Uuid, attempt: &Attempt) {
        self.seen
            .lock()
            .unwrap()
            .push((*correlation_id, attempt.clone()));
    }
}

pub fn throttled() -> DriverError {
    DriverError::new("TooManyRequests (429)").with_code(CODE_OVERLOADED)
}

pub fn throttled_with_hint(ms: u64) -> DriverError {
    throttled().with_retry_after(Duration::from_millis(ms))
}

pub fn timeout() -> DriverError {
    DriverError::new("no response received from coordinator within timeout period")
}

pub fn unavailable() -> DriverError {
    DriverError::new("no hosts available in the pool")
}

pub fn other() -> DriverError {
    DriverError::new("line 1:12 mismatched input 'valuez'")
}
