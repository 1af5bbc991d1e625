use thiserror::Error;

use chirp_store::StoreError;

/// Errors that can occur within any channel adapter.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The underlying transport could not be established.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A message could not be delivered to the remote endpoint.
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// The channel rejected the supplied credentials or token.
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    /// An operation exceeded its allowed time budget.
    #[error("Operation timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// The channel-specific configuration or a stored credential is missing.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The transport went away (EOF, closed socket, stopped loop).
    #[error("Disconnected: {0}")]
    Disconnected(String),

    /// The remote end sent something the adapter could not make sense of.
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl ChannelError {
    /// Missing credential key in the store: fatal for adapter startup.
    pub fn missing_credential(key: &str, source: StoreError) -> Self {
        ChannelError::ConfigError(format!("store key {key} is required: {source}"))
    }
}
