//! In-memory partitioned store with provisioned throughput per partition.
//!
//! Stands in for the real cluster: each partition owns a token bucket of
//! request units (RUs) refilled continuously, and a write that cannot be paid
//! for is rejected the way the hosted service does it, with an Overloaded
//! code, a `TooManyRequests (429)` message and a `RetryAfterMs` hint.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

use crate::config::StoreConfig;
use crate::driver::WriteDriver;
use crate::operation::{Operation, OrderRecord};
use crate::retry::{DriverError, CODE_OVERLOADED, CODE_UNAVAILABLE, CODE_WRITE_TIMEOUT};

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    capacity: f64,
    last_refill: Instant,
}

impl Bucket {
    fn full(capacity: f64, now: Instant) -> Self {
        Self {
            tokens: capacity,
            capacity,
            last_refill: now,
        }
    }

    /// Take `cost` RUs, or report how long until enough have accrued.
    fn try_take(&mut self, cost: f64, rate: f64, now: Instant) -> Result<(), Duration> {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * rate).min(self.capacity);
        self.last_refill = now;
        if self.tokens >= cost {
            self.tokens -= cost;
            return Ok(());
        }
        Err(Duration::from_secs_f64((cost - self.tokens) / rate))
    }
}

/// Throughput-limited in-memory table of orders, keyed by order id.
#[derive(Debug)]
pub struct ThrottledStore {
    cfg: StoreConfig,
    buckets: Vec<Mutex<Bucket>>,
    rows: Mutex<HashMap<Uuid, OrderRecord>>,
    closed: AtomicBool,
}

impl ThrottledStore {
    pub fn new(cfg: StoreConfig) -> Self {
        let now = Instant::now();
        let partitions = cfg.partitions.max(1);
        // One second of throughput, but never less than a single write.
        let capacity = f64::from(cfg.request_units_per_sec.max(cfg.write_cost));
        let buckets = (0..partitions)
            .map(|_| Mutex::new(Bucket::full(capacity, now)))
            .collect();
        Self {
            cfg,
            buckets,
            rows: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.cfg
    }

    pub fn partition_of(&self, id: &Uuid) -> usize {
        (id.as_u128() % self.buckets.len() as u128) as usize
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, id: &Uuid) -> Option<OrderRecord> {
        self.rows
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .cloned()
    }

    /// Stop accepting writes; later attempts fail as unavailable.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            tracing::info!(rows = self.len(), "store closed");
        }
    }

    fn admit(&self, id: &Uuid) -> Result<(), DriverError> {
        let rate = f64::from(self.cfg.request_units_per_sec);
        if rate <= 0.0 {
            return Ok(());
        }
        let cost = f64::from(self.cfg.write_cost);
        let partition = self.partition_of(id);
        let admitted = self.buckets[partition]
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .try_take(cost, rate, Instant::now());
        admitted.map_err(|wait| {
            let ms = (wait.as_secs_f64() * 1000.0).ceil().max(1.0) as u64;
            tracing::trace!(partition, retry_after_ms = ms, "partition throughput exceeded");
            DriverError::new(format!(
                "Request rate is large: RetryAfterMs={ms}, Additional details='Response status code does not indicate success: TooManyRequests (429)'"
            ))
            .with_code(CODE_OVERLOADED)
        })
    }
}

#[async_trait]
impl WriteDriver for ThrottledStore {
    async fn write(&self, op: &Operation) -> Result<(), DriverError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(DriverError::new("no hosts available in the pool").with_code(CODE_UNAVAILABLE));
        }
        self.admit(&op.record.id)?;

        let latency = Duration::from_millis(self.cfg.latency_ms);
        let deadline = Duration::from_millis(self.cfg.timeout_ms);
        if !deadline.is_zero() && latency >= deadline {
            tokio::time::sleep(deadline).await;
            return Err(DriverError::new(
                "Operation timed out - received only 0 responses.",
            )
            .with_code(CODE_WRITE_TIMEOUT));
        }
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        self.rows
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(op.record.id, op.record.clone());
        Ok(())
    }
}
