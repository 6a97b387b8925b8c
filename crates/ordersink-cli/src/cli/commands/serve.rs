//! `ordersink serve` – run the /orders endpoint until SIGINT/SIGTERM.

use anyhow::{Context, Result};
use ordersink_core::config::AppConfig;
use ordersink_core::store::ThrottledStore;
use std::sync::Arc;

use crate::server::{self, AppState};

pub async fn run_serve(cfg: &AppConfig, listen: Option<&str>) -> Result<()> {
    let addr = listen.unwrap_or(&cfg.listen_addr);
    let store = Arc::new(ThrottledStore::new(cfg.store.clone()));
    let state = Arc::new(AppState::new(Arc::clone(&store), cfg));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(
        retry_enabled = cfg.retry.enabled,
        max_retries = cfg.retry.max_retries,
        "listening on {}",
        listener.local_addr()?
    );

    let shutdown = {
        let state = Arc::clone(&state);
        async move {
            server::shutdown_signal().await;
            let cancelled = state.control.cancel_all();
            tracing::info!(cancelled, "shutting down");
        }
    };
    axum::serve(listener, server::router(Arc::clone(&state)))
        .with_graceful_shutdown(shutdown)
        .await?;

    store.close();
    tracing::info!("store closed, disconnected");
    Ok(())
}
