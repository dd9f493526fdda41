use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::app::AppState;

/// Serves `metrics.export()` (§4.10/§6) on `GET /metrics`, plus a trivial
/// `/healthz`. Grounded on the teacher's `codegraph-api` `axum::Router`
/// wiring, narrowed to the one read-only surface this crate needs.
pub async fn serve(state: Arc<AppState>, bind_addr: &str) -> anyhow::Result<()> {
    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!(addr = bind_addr, "metrics facade listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (StatusCode::OK, state.metrics.export())
}

async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}
