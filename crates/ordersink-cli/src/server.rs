//! HTTP transport: `/orders` runs one write through the orchestrator and maps
//! the terminal outcome to a status code.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use ordersink_core::config::AppConfig;
use ordersink_core::control::WriteControl;
use ordersink_core::operation::{Operation, OrderRecord};
use ordersink_core::retry::{TracingObserver, WriteOrchestrator};
use ordersink_core::store::ThrottledStore;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

pub struct AppState {
    pub orchestrator: WriteOrchestrator<Arc<ThrottledStore>, TracingObserver>,
    pub control: WriteControl,
    /// Per-request deadline handed to the orchestrator as a cancel token.
    pub request_deadline: Option<Duration>,
}

impl AppState {
    pub fn new(store: Arc<ThrottledStore>, cfg: &AppConfig) -> Self {
        Self {
            orchestrator: WriteOrchestrator::from_config(store, &cfg.retry, TracingObserver),
            control: WriteControl::new(),
            request_deadline: (cfg.request_deadline_ms > 0)
                .then(|| Duration::from_millis(cfg.request_deadline_ms)),
        }
    }
}

#[derive(Debug, Serialize)]
struct OrderCreated {
    #[serde(flatten)]
    order: OrderRecord,
    attempts: u32,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/orders", get(add_order).post(add_order))
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

/// Insert a freshly generated order.
async fn add_order(State(state): State<Arc<AppState>>) -> Response {
    let op = Operation::insert(OrderRecord::generate());
    let deadline = state.request_deadline.map(|d| Instant::now() + d);
    let registered = state.control.register(op.correlation_id, deadline);

    match state.orchestrator.execute_with(&op, registered.token()).await {
        Ok(receipt) => {
            tracing::info!(attempts = receipt.attempts, "Added order ID {}", op.record.id);
            let body = OrderCreated {
                order: op.record,
                attempts: receipt.attempts,
            };
            (StatusCode::CREATED, Json(body)).into_response()
        }
        Err(err) => {
            let status = StatusCode::from_u16(err.status_code())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            tracing::warn!(
                correlation_id = %op.correlation_id,
                status = status.as_u16(),
                attempts = err.attempts_made(),
                "order write failed: {}",
                err
            );
            (status, err.to_string()).into_response()
        }
    }
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("could not listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!("could not listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
