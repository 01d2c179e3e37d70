//! HTTP control plane
//!
//! - `GET|POST /change-state?action=pause|resume`
//! - `GET /sent-messages`
//! - `GET /health`, `GET /metrics`

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};
use sms_dispatch::{DispatchControl, MessageStore};
use tower_http::trace::TraceLayer;
use tracing::error;

#[derive(Clone)]
pub struct AppState {
    pub control: Arc<dyn DispatchControl>,
    pub store: Arc<dyn MessageStore>,
    pub metrics: PrometheusHandle,
}

#[derive(Debug, Deserialize)]
pub struct ChangeStateQuery {
    action: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StateResponse {
    running: bool,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/change-state", get(change_state_handler).post(change_state_handler))
        .route("/sent-messages", get(sent_messages_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn change_state_handler(
    State(state): State<AppState>,
    Query(query): Query<ChangeStateQuery>,
) -> Response {
    match query.action.as_deref() {
        Some("pause") => {
            state.control.pause();
        }
        Some("resume") => {
            state.control.resume();
        }
        _ => return (StatusCode::BAD_REQUEST, "invalid action").into_response(),
    }

    Json(StateResponse {
        running: !state.control.is_paused(),
    })
    .into_response()
}

async fn sent_messages_handler(State(state): State<AppState>) -> Response {
    match state.store.fetch_sent().await {
        Ok(messages) => Json(messages).into_response(),
        Err(e) => {
            error!(error = %e, "Failed to fetch sent messages");
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to fetch sent messages").into_response()
        }
    }
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "UP",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn metrics_handler(State(state): State<AppState>) -> String {
    state.metrics.render()
}
