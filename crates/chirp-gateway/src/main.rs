use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};

use chirp_channels::{ChannelManager, Dispatcher};
use chirp_core::config::ChirpConfig;
use chirp_core::types::Service;
use chirp_plugins::Registry;
use chirp_store::{SharedStore, SqliteStore, Store, StoreError};

mod app;
mod cli;
mod http;
mod webhook;

#[cfg(test)]
mod test_support;

use cli::{Cli, Command, StoreAction};
use webhook::{NotificationQueue, WebhookChannel};

pub const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("CHIRP_GIT_SHA"), ")");

/// How long adapter tasks get to wind down after `disconnect_all`.
const ADAPTER_STOP_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chirp_gateway=info,tower_http=debug".into()),
        )
        .init();

    let cli = Cli::parse();

    // config: --config / CHIRP_CONFIG > ~/.chirp/chirp.toml
    let config = ChirpConfig::load(cli.config.as_deref()).unwrap_or_else(|e| {
        warn!("Config load failed ({}), using defaults", e);
        ChirpConfig::default()
    });

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(config).await,
        Command::Store { action } => store_command(&config, action),
        Command::Plugins => {
            for info in Registry::builtin()?.catalog() {
                println!("{:<10} {:<50} {}", info.name, info.pattern, info.description);
            }
            Ok(())
        }
    }
}

fn store_command(config: &ChirpConfig, action: StoreAction) -> anyhow::Result<()> {
    let store = SqliteStore::open(&config.store.path)?;
    match action {
        StoreAction::Get { key } => match store.get(&key) {
            Ok(value) => println!("{value}"),
            Err(StoreError::NotFound { .. }) => anyhow::bail!("{key} is not set"),
            Err(e) => return Err(e.into()),
        },
        StoreAction::Set { key, value } => {
            store.set(&key, &value)?;
            info!(key = %key, "store key set");
        }
    }
    Ok(())
}

async fn run(config: ChirpConfig) -> anyhow::Result<()> {
    info!(path = %config.store.path, "opening store");
    let store: SharedStore = Arc::new(SqliteStore::open(&config.store.path)?);

    let registry = Arc::new(Registry::builtin()?);
    info!(plugins = registry.len(), "plugin registry built");
    let dispatcher = Arc::new(Dispatcher::from_config(
        registry,
        Arc::clone(&store),
        &config.bot,
    ));

    let notifications = Arc::new(NotificationQueue::new());
    let manager = Arc::new(build_manager(&config, &dispatcher, &notifications));
    if manager.is_empty() {
        warn!("no channels configured; only /health will answer");
    }
    let tasks = manager.spawn_all(Arc::clone(&store));

    let addr: SocketAddr = format!("{}:{}", config.gateway.bind, config.gateway.port).parse()?;
    let shutdown_grace = Duration::from_secs(config.bot.deferred_shutdown_secs);
    let state = Arc::new(app::AppState::new(
        config,
        Arc::clone(&dispatcher),
        Arc::clone(&manager),
        notifications,
    ));
    let router = app::build_router(state);

    info!(%addr, version = VERSION, "chirp listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("shutting down");
    manager.disconnect_all().await;
    for task in tasks {
        if tokio::time::timeout(ADAPTER_STOP_GRACE, task).await.is_err() {
            warn!("adapter task did not stop in time");
        }
    }
    if !dispatcher.shutdown(shutdown_grace).await {
        warn!(
            outstanding = dispatcher.outstanding(),
            "deferred replies still pending at exit"
        );
    }
    Ok(())
}

/// Register one adapter per configured `[channels.*]` section plus the
/// webhook channels when enabled.
fn build_manager(
    config: &ChirpConfig,
    dispatcher: &Arc<Dispatcher>,
    notifications: &Arc<NotificationQueue>,
) -> ChannelManager {
    let mut manager = ChannelManager::new();
    let channels = &config.channels;

    if let Some(signal) = &channels.signal {
        manager.register(
            Arc::new(chirp_signal::SignalChannel::new(
                &signal.socket_path,
                Arc::clone(dispatcher),
            )),
            signal.restart,
        );
    }
    if let Some(irc) = &channels.irc {
        manager.register(
            Arc::new(chirp_irc::IrcChannel::new(irc.clone(), Arc::clone(dispatcher))),
            irc.restart,
        );
    }
    if let Some(matrix) = &channels.matrix {
        manager.register(
            Arc::new(chirp_matrix::MatrixChannel::new(
                matrix.clone(),
                Arc::clone(dispatcher),
            )),
            matrix.restart,
        );
    }
    if let Some(xmpp) = &channels.xmpp {
        manager.register(
            Arc::new(chirp_xmpp::XmppChannel::new(xmpp.clone(), Arc::clone(dispatcher))),
            xmpp.restart,
        );
    }

    let hooks = &config.webhooks;
    if hooks.enabled {
        if hooks.username.is_none() || hooks.password.is_none() {
            warn!("webhooks enabled without username/password; every request will be refused");
        }
        for service in [Service::Sms, Service::Notify] {
            manager.register(
                Arc::new(WebhookChannel::new(service, Arc::clone(notifications))),
                false,
            );
        }
    }

    manager
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "ctrl-c handler failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chirp_core::config::{IrcConfig, WebhooksConfig};
    use chirp_store::MemoryStore;

    #[test]
    fn manager_registers_configured_channels_only() {
        let mut config = ChirpConfig::default();
        config.channels.irc = Some(IrcConfig {
            server: "irc.example.net".into(),
            port: 6667,
            nick: "chirp".into(),
            user: None,
            password: None,
            rooms: vec!["#ops".into()],
            restart: true,
        });
        config.webhooks = WebhooksConfig {
            enabled: true,
            ..WebhooksConfig::default()
        };

        let store: SharedStore = Arc::new(MemoryStore::new());
        let dispatcher = Arc::new(Dispatcher::from_config(
            Arc::new(Registry::new()),
            store,
            &config.bot,
        ));
        let manager = build_manager(&config, &dispatcher, &Arc::new(NotificationQueue::new()));

        let names: Vec<String> = manager.statuses().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["irc", "notify", "sms"]);
        assert!(manager.get("signal").is_none());
    }
}
