use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChirpError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Channel error ({channel}): {reason}")]
    Channel { channel: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ChirpError {
    /// Short error code string, used in HTTP error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            ChirpError::Config(_) => "CONFIG_ERROR",
            ChirpError::AuthFailed(_) => "AUTH_FAILED",
            ChirpError::Store(_) => "STORE_ERROR",
            ChirpError::Channel { .. } => "CHANNEL_ERROR",
            ChirpError::Serialization(_) => "SERIALIZATION_ERROR",
            ChirpError::Io(_) => "IO_ERROR",
            ChirpError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, ChirpError>;
