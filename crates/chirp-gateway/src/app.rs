use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use chirp_channels::{ChannelManager, Dispatcher};
use chirp_core::config::ChirpConfig;
use tower_http::trace::TraceLayer;

use crate::webhook::NotificationQueue;

/// Central shared state, passed as Arc<AppState> to all Axum handlers.
pub struct AppState {
    pub config: ChirpConfig,
    pub dispatcher: Arc<Dispatcher>,
    pub manager: Arc<ChannelManager>,
    /// Deferred replies for webhook-originated messages, keyed by target.
    pub notifications: Arc<NotificationQueue>,
}

impl AppState {
    pub fn new(
        config: ChirpConfig,
        dispatcher: Arc<Dispatcher>,
        manager: Arc<ChannelManager>,
        notifications: Arc<NotificationQueue>,
    ) -> Self {
        Self {
            config,
            dispatcher,
            manager,
            notifications,
        }
    }
}

/// Assemble the Axum router. Ingestion routes exist only when webhooks are enabled.
pub fn build_router(state: Arc<AppState>) -> Router {
    let mut router = Router::new().route("/health", get(crate::http::health::health_handler));

    let hooks = &state.config.webhooks;
    if hooks.enabled {
        router = router
            .route(&hooks.sms_path, post(crate::http::webhooks::sms_handler))
            .route(&hooks.notify_path, post(crate::http::webhooks::notify_handler))
            .route(
                "/notifications",
                get(crate::http::notifications::notifications_handler),
            );
    }

    router
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
