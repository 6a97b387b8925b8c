//! `ordersink insert` – write one order and report how it went.

use anyhow::{anyhow, Result};
use ordersink_core::config::AppConfig;
use ordersink_core::operation::{Operation, OrderRecord};
use ordersink_core::retry::{TracingObserver, WriteOrchestrator};
use ordersink_core::store::ThrottledStore;

pub async fn run_insert(cfg: &AppConfig, non_idempotent: bool) -> Result<()> {
    let store = ThrottledStore::new(cfg.store.clone());
    let orchestrator = WriteOrchestrator::from_config(store, &cfg.retry, TracingObserver);

    let mut op = Operation::insert(OrderRecord::generate());
    if non_idempotent {
        op = op.non_idempotent();
    }
    let id = op.record.id;

    match orchestrator.execute(&op).await {
        Ok(receipt) => {
            tracing::info!("Added order ID {}", id);
            println!(
                "Added order ID {id} ({} attempt(s), {} ms)",
                receipt.attempts,
                receipt.elapsed.as_millis()
            );
            Ok(())
        }
        Err(err) => Err(anyhow!(err).context(format!("order {id} not written"))),
    }
}
