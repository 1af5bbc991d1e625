use chirp_channels::ChannelError;

#[derive(Debug, thiserror::Error)]
pub enum XmppError {
    #[error("invalid JID {jid}: {reason}")]
    InvalidJid { jid: String, reason: String },

    #[error("stream error: {0}")]
    Stream(String),

    #[error("stream closed")]
    Closed,
}

impl From<XmppError> for ChannelError {
    fn from(e: XmppError) -> Self {
        match e {
            XmppError::InvalidJid { .. } => ChannelError::ConfigError(e.to_string()),
            other => ChannelError::Disconnected(other.to_string()),
        }
    }
}
