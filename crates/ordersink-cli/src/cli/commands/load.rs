//! `ordersink load` – fire many concurrent inserts and summarize the outcome.

use anyhow::Result;
use ordersink_core::config::AppConfig;
use ordersink_core::control::CancelToken;
use ordersink_core::operation::{Operation, OrderRecord};
use ordersink_core::retry::{
    AttemptStats, CountingObserver, TracingObserver, WriteError, WriteOrchestrator, WriteReceipt,
};
use ordersink_core::store::ThrottledStore;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;

/// Terminal outcomes of a load run, grouped the way the endpoint reports them.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub succeeded: u64,
    /// Failed writes by terminal kind (`throttled`, `timeout`, ..., `cancelled`).
    pub failed: BTreeMap<&'static str, u64>,
    /// Attempts issued by successful writes.
    pub success_attempts: u64,
}

impl LoadSummary {
    pub fn add(&mut self, result: &Result<WriteReceipt, WriteError>) {
        match result {
            Ok(receipt) => {
                self.succeeded += 1;
                self.success_attempts += u64::from(receipt.attempts);
            }
            Err(err) => {
                let label = err.kind().map(|k| k.as_str()).unwrap_or("cancelled");
                *self.failed.entry(label).or_default() += 1;
            }
        }
    }

    pub fn total_failed(&self) -> u64 {
        self.failed.values().sum()
    }
}

pub async fn run_load(
    cfg: &AppConfig,
    count: usize,
    concurrency: usize,
    non_idempotent: bool,
) -> Result<()> {
    let store = Arc::new(ThrottledStore::new(cfg.store.clone()));
    let counters = Arc::new(CountingObserver::new());
    let orchestrator = Arc::new(WriteOrchestrator::from_config(
        Arc::clone(&store),
        &cfg.retry,
        (TracingObserver, Arc::clone(&counters)),
    ));
    let permits = Arc::new(Semaphore::new(concurrency.max(1)));
    let cancel = CancelToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupt received, cancelling in-flight writes");
                cancel.cancel();
            }
        });
    }

    let started = Instant::now();
    let mut tasks = Vec::with_capacity(count);
    for _ in 0..count {
        let permit = Arc::clone(&permits).acquire_owned().await?;
        let orchestrator = Arc::clone(&orchestrator);
        let cancel = cancel.clone();
        tasks.push(tokio::spawn(async move {
            let _permit = permit;
            let mut op = Operation::insert(OrderRecord::generate());
            if non_idempotent {
                op = op.non_idempotent();
            }
            orchestrator.execute_with(&op, &cancel).await
        }));
    }

    let mut summary = LoadSummary::default();
    for task in tasks {
        summary.add(&task.await?);
    }
    let elapsed = started.elapsed();

    print_summary(&summary, &counters.snapshot(), store.len(), elapsed.as_secs_f64());
    Ok(())
}

fn print_summary(summary: &LoadSummary, stats: &AttemptStats, rows: usize, secs: f64) {
    println!(
        "{} ok, {} failed, {} rows stored in {:.2}s",
        summary.succeeded,
        summary.total_failed(),
        rows,
        secs
    );
    if summary.succeeded > 0 {
        println!(
            "  {:.2} attempts per successful write",
            summary.success_attempts as f64 / summary.succeeded as f64
        );
    }
    for (kind, n) in &summary.failed {
        println!("  failed {:<12} {}", kind, n);
    }
    for line in attempt_lines(stats) {
        println!("{line}");
    }
}

/// Attempt totals, then failed attempts per kind across every attempt issued.
fn attempt_lines(stats: &AttemptStats) -> [String; 2] {
    [
        format!(
            "attempts: {} total, {} retried",
            stats.attempts, stats.retried_attempts
        ),
        format!(
            "failures by kind: {} throttled, {} timeout, {} unavailable, {} other, {} cancelled",
            stats.throttled, stats.timeouts, stats.unavailable, stats.other, stats.cancelled
        ),
    ]
}
