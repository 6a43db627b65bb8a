//! HTTP triggers for an external scheduler.
//!
//! `/tasks/poll` and `/tasks/process` each run one poll or one batch and
//! answer 200 with the run report, or 500 with the error text when the run
//! itself failed (feed fetch or lease). Per-entry and per-job failures are
//! only visible in the report counts and the logs.

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use serde::Serialize;
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::error::Result;
use crate::pipeline::{Poller, Worker};
use crate::store::WorkQueue;

pub struct AppState {
    pub poller: Arc<Poller>,
    pub worker: Arc<Worker>,
    pub queue: Arc<dyn WorkQueue>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // Cron-style schedulers issue GET.
        .route("/tasks/poll", get(poll).post(poll))
        .route("/tasks/process", get(process).post(process))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until `shutdown` resolves.
pub async fn serve(
    bind: &str,
    state: Arc<AppState>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!(%bind, "listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

fn run_response<T: Serialize>(result: Result<T>) -> Response {
    match result {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

async fn poll(State(state): State<Arc<AppState>>) -> Response {
    run_response(state.poller.poll().await)
}

async fn process(State(state): State<Arc<AppState>>) -> Response {
    run_response(state.worker.process_batch().await)
}

async fn health(State(state): State<Arc<AppState>>) -> Response {
    match state.queue.ping().await {
        Ok(()) => Json(json!({ "status": "ok" })).into_response(),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "unavailable", "error": e.to_string() })),
        )
            .into_response(),
    }
}
