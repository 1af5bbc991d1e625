use tokio_util::codec::LinesCodecError;

use chirp_channels::ChannelError;

/// Errors produced by the IRC adapter.
#[derive(Debug, thiserror::Error)]
pub enum IrcError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("line codec error: {0}")]
    Codec(#[from] LinesCodecError),

    #[error("server closed the connection")]
    Closed,
}

impl From<IrcError> for ChannelError {
    fn from(e: IrcError) -> Self {
        ChannelError::Disconnected(e.to_string())
    }
}
