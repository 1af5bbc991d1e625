use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 8089;
pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEFAULT_SIGNAL_SOCKET: &str = "/run/signal-cli/socket";
pub const DEFAULT_IRC_PORT: u16 = 6667;
pub const DEFAULT_DEFERRED_SHUTDOWN_SECS: u64 = 5;

/// Top-level config (chirp.toml + CHIRP_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChirpConfig {
    #[serde(default)]
    pub bot: BotConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub channels: ChannelsConfig,
    #[serde(default)]
    pub webhooks: WebhooksConfig,
}

/// How the dispatcher resolves several plugins matching the same message.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Every matching plugin runs; only the last one's reply is sent.
    #[default]
    LastWins,
    /// Stop at the first matching plugin.
    FirstWins,
    /// Every matching plugin runs and every reply is sent.
    Aggregate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Token an addressed plugin looks for in the message body (usually the nick).
    #[serde(default = "default_identity")]
    pub identity: String,
    #[serde(default)]
    pub match_mode: MatchMode,
    /// Grace period granted to outstanding deferred replies on shutdown.
    #[serde(default = "default_deferred_shutdown_secs")]
    pub deferred_shutdown_secs: u64,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            identity: default_identity(),
            match_mode: MatchMode::default(),
            deferred_shutdown_secs: DEFAULT_DEFERRED_SHUTDOWN_SECS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChannelsConfig {
    pub signal: Option<SignalConfig>,
    pub irc: Option<IrcConfig>,
    pub matrix: Option<MatrixConfig>,
    pub xmpp: Option<XmppConfig>,
}

/// Local signal-cli daemon in JSON-RPC socket mode.
///
/// The bot's own account UUID is read from the store key `signal:account`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalConfig {
    #[serde(default = "default_signal_socket")]
    pub socket_path: String,
    /// Re-run `connect` with backoff when the daemon goes away.
    #[serde(default)]
    pub restart: bool,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            socket_path: default_signal_socket(),
            restart: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IrcConfig {
    pub server: String,
    #[serde(default = "default_irc_port")]
    pub port: u16,
    pub nick: String,
    /// USER name; defaults to the nick.
    pub user: Option<String>,
    /// Server password sent with PASS before registration.
    pub password: Option<String>,
    /// Channels joined after the welcome numeric.
    #[serde(default)]
    pub rooms: Vec<String>,
    #[serde(default)]
    pub restart: bool,
}

/// Matrix homeserver connection.
///
/// Credentials live in the store: `matrix:user_id` and `matrix:access_token`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatrixConfig {
    pub homeserver: String,
    /// Only invites sent by this user id are accepted.
    pub owner: String,
    #[serde(default)]
    pub restart: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XmppConfig {
    pub jid: String,
    pub password: String,
    #[serde(default)]
    pub restart: bool,
}

/// HTTP ingestion endpoints (SMS gateway callbacks, notifications).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhooksConfig {
    /// When false the ingestion routes are not mounted.
    #[serde(default)]
    pub enabled: bool,
    /// HTTP Basic credentials every ingestion request must carry.
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(default = "default_sms_path")]
    pub sms_path: String,
    #[serde(default = "default_notify_path")]
    pub notify_path: String,
}

impl Default for WebhooksConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            username: None,
            password: None,
            sms_path: default_sms_path(),
            notify_path: default_notify_path(),
        }
    }
}

fn default_identity() -> String {
    "chirp".to_string()
}
fn default_deferred_shutdown_secs() -> u64 {
    DEFAULT_DEFERRED_SHUTDOWN_SECS
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_irc_port() -> u16 {
    DEFAULT_IRC_PORT
}
fn default_signal_socket() -> String {
    DEFAULT_SIGNAL_SOCKET.to_string()
}
fn default_sms_path() -> String {
    "/sms".to_string()
}
fn default_notify_path() -> String {
    "/notify".to_string()
}
fn default_store_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.chirp/store.db", home)
}

impl ChirpConfig {
    /// Load config from a TOML file with CHIRP_* env var overrides.
    ///
    /// Nested keys use a double underscore, e.g. `CHIRP_BOT__IDENTITY=bot`.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        Self::figment(&path)
            .extract()
            .map_err(|e| crate::error::ChirpError::Config(e.to_string()))
    }

    fn figment(path: &str) -> Figment {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("CHIRP_").split("__"))
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.chirp/chirp.toml", home)
}
