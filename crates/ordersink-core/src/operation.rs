//! The logical write being retried: an order row insert.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fixed categorical label stored with every order.
pub const FIXED_LOCATION: &str = "Seattle";

/// One order row: `(id, amount, state, time)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub id: Uuid,
    pub amount: u32,
    pub state: String,
    pub time: DateTime<Utc>,
}

impl OrderRecord {
    /// New order with a fresh id, an amount in `[50, 250)` and the current time.
    pub fn generate() -> Self {
        Self {
            id: Uuid::new_v4(),
            amount: rand::thread_rng().gen_range(50..250),
            state: FIXED_LOCATION.to_string(),
            time: Utc::now(),
        }
    }
}

/// A single logical write handed to the orchestrator.
///
/// The payload is immutable once built; retries resend exactly the same row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub correlation_id: Uuid,
    pub record: OrderRecord,
    /// Whether resending after an ambiguous failure is harmless.
    pub idempotent: bool,
}

impl Operation {
    /// Insert keyed by the record's own id. Idempotent: a resend overwrites the same row.
    pub fn insert(record: OrderRecord) -> Self {
        Self {
            correlation_id: record.id,
            record,
            idempotent: true,
        }
    }

    /// Mark the write as unsafe to resend (e.g. counter updates or server-generated keys).
    pub fn non_idempotent(mut self) -> Self {
        self.idempotent = false;
        self
    }
}
