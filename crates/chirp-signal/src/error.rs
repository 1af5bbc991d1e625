use thiserror::Error;

use chirp_channels::ChannelError;

#[derive(Debug, Error)]
pub enum SignalError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("frame exceeds {max} bytes")]
    FrameTooLong { max: usize },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<SignalError> for ChannelError {
    fn from(e: SignalError) -> Self {
        match e {
            SignalError::Io(e) => ChannelError::Disconnected(e.to_string()),
            other => ChannelError::Protocol(other.to_string()),
        }
    }
}
