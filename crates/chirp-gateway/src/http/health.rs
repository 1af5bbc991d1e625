use axum::{extract::State, Json};
use serde_json::{json, Map, Value};
use std::sync::Arc;

use crate::app::AppState;

/// GET /health: liveness probe with per-adapter status.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let channels: Map<String, Value> = state
        .manager
        .statuses()
        .into_iter()
        .map(|(name, status)| (name, json!(status)))
        .collect();

    Json(json!({
        "status": "ok",
        "version": crate::VERSION,
        "plugins": state.dispatcher.registry().len(),
        "deferred": state.dispatcher.outstanding(),
        "channels": channels,
    }))
}
