//! Route Configuration
//!
//! The gateway's HTTP surface: the socket upgrade endpoint, a health probe,
//! and Prometheus metrics.

use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::infrastructure::metrics;
use crate::startup::AppState;

use super::handler::ws_handler;

/// Create the gateway router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health response body
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    #[serde(rename = "gatewayID")]
    pub gateway_id: String,
    pub port: u16,
}

/// `GET /health`
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        gateway_id: state.manager.gateway_id().to_string(),
        port: state.settings.gateway.port,
    })
}

/// Prometheus metrics endpoint handler
async fn metrics_handler() -> impl IntoResponse {
    (
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        metrics::gather_metrics(),
    )
}
