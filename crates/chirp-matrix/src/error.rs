use chirp_channels::ChannelError;

/// Errors produced by the Matrix client.
#[derive(Debug, thiserror::Error)]
pub enum MatrixError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<MatrixError> for ChannelError {
    fn from(e: MatrixError) -> Self {
        match e {
            MatrixError::Api { status, message } if status == 401 || status == 403 => {
                ChannelError::AuthFailed(message)
            }
            other => ChannelError::ConnectionFailed(other.to_string()),
        }
    }
}
