use std::sync::Arc;

use chirp_channels::{ChannelManager, Dispatcher};
use chirp_core::config::{ChirpConfig, WebhooksConfig};
use chirp_core::types::Service;
use chirp_plugins::Registry;
use chirp_store::{MemoryStore, SharedStore};

use crate::app::AppState;
use crate::webhook::{NotificationQueue, WebhookChannel};

/// App state with the stock plugins, an in-memory store and webhooks
/// enabled for `gw` / `s3cret`.
pub fn state() -> Arc<AppState> {
    let mut config = ChirpConfig::default();
    config.webhooks = WebhooksConfig {
        enabled: true,
        username: Some("gw".into()),
        password: Some("s3cret".into()),
        ..WebhooksConfig::default()
    };

    let store: SharedStore = Arc::new(MemoryStore::new());
    let dispatcher = Arc::new(Dispatcher::from_config(
        Arc::new(Registry::builtin().unwrap()),
        store,
        &config.bot,
    ));
    let notifications = Arc::new(NotificationQueue::new());
    let mut manager = ChannelManager::new();
    manager.register(
        Arc::new(WebhookChannel::new(Service::Sms, Arc::clone(&notifications))),
        false,
    );

    Arc::new(AppState::new(
        config,
        dispatcher,
        Arc::new(manager),
        notifications,
    ))
}
