//! Notification polling endpoint: GET /notifications?target=…
//!
//! Webhook clients poll this to pick up deferred replies (reminders and the
//! like) produced after their original request was answered.
//!
//! Auth: the same HTTP Basic credentials as the ingestion endpoints.
//! Response: `{ "target": "...", "notifications": ["msg1", "msg2"] }`

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::auth::{check_basic, Rejection};
use crate::app::AppState;

#[derive(Deserialize)]
pub struct NotificationQuery {
    #[serde(default)]
    pub target: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NotificationResponse {
    pub target: String,
    pub notifications: Vec<String>,
}

/// GET /notifications: drain and return everything pending for one target.
pub async fn notifications_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<NotificationQuery>,
) -> Result<Json<NotificationResponse>, Rejection> {
    check_basic(&state.config.webhooks, &headers)?;
    if query.target.is_empty() {
        return Err(Rejection::BadRequest("missing target".to_string()));
    }

    let notifications = state.notifications.drain(&query.target);
    Ok(Json(NotificationResponse {
        target: query.target,
        notifications,
    }))
}
