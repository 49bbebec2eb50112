//! Authenticated admin API.
//!
//! # Routes
//! ```text
//! GET  /admin/status                          latest scheduler snapshot
//! GET  /admin/breakers                        circuit breaker states
//! GET  /admin/metrics                         uptime / recovery / MTTR summary
//! GET  /admin/quarantine                      stats and pending items
//! POST /admin/quarantine                      submit an external signal
//! POST /admin/quarantine/{id}/confirm         manual confirmation
//! POST /admin/quarantine/{id}/reject          manual rejection
//! POST /admin/incidents/{id}/false-positive   mark an incident as not real
//! ```
//!
//! Every route requires `Authorization: Bearer <admin.api_key>`.

pub mod auth;
pub mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::config::SharedConfig;
use crate::escalation::SnapshotHandle;
use crate::observability::MetricsSink;
use crate::quarantine::QuarantineGate;
use crate::resilience::BreakerRegistry;

/// Read handles shared with the control loop.
#[derive(Clone)]
pub struct AdminState {
    pub config: SharedConfig,
    pub snapshot: SnapshotHandle,
    pub breakers: Arc<BreakerRegistry>,
    pub sink: Arc<MetricsSink>,
    pub quarantine: Arc<QuarantineGate>,
}

pub fn setup_admin_router(state: AdminState) -> Router {
    let timeout = Duration::from_secs(state.config.load().admin.request_timeout_secs);
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/breakers", get(get_breakers))
        .route("/admin/metrics", get(get_metrics))
        .route("/admin/quarantine", get(get_quarantine).post(submit_signal))
        .route("/admin/quarantine/{id}/confirm", post(confirm_signal))
        .route("/admin/quarantine/{id}/reject", post(reject_signal))
        .route("/admin/incidents/{id}/false-positive", post(mark_false_positive))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(timeout)),
        )
}

/// Serve the admin API until `shutdown` fires.
pub async fn serve(
    state: AdminState,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), std::io::Error> {
    let bind: SocketAddr = state
        .config
        .load()
        .admin
        .bind_address
        .parse()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
    let listener = TcpListener::bind(bind).await?;
    tracing::info!(address = %listener.local_addr()?, "Admin API listening");

    axum::serve(listener, setup_admin_router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await
}
