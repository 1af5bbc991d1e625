use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// Runtime connection state of a channel adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelStatus {
    /// Fully connected and ready to send/receive.
    Connected,

    /// Attempting to establish or re-establish the connection.
    Connecting,

    /// Cleanly disconnected (not an error condition).
    Disconnected,

    /// The last connect attempt ended with this error.
    Error(String),
}

/// Shared, lock-protected [`ChannelStatus`] for adapters to embed.
#[derive(Debug)]
pub struct StatusCell(Mutex<ChannelStatus>);

impl StatusCell {
    pub fn new() -> Self {
        Self(Mutex::new(ChannelStatus::Disconnected))
    }

    pub fn set(&self, status: ChannelStatus) {
        *self.0.lock().unwrap_or_else(|p| p.into_inner()) = status;
    }

    pub fn get(&self) -> ChannelStatus {
        self.0.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

impl Default for StatusCell {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&ChannelStatus::Connecting).unwrap();
        assert_eq!(json, r#""connecting""#);
        let json = serde_json::to_string(&ChannelStatus::Error("eof".into())).unwrap();
        assert_eq!(json, r#"{"error":"eof"}"#);
    }

    #[test]
    fn cell_starts_disconnected() {
        let cell = StatusCell::new();
        assert_eq!(cell.get(), ChannelStatus::Disconnected);
        cell.set(ChannelStatus::Connected);
        assert_eq!(cell.get(), ChannelStatus::Connected);
    }
}
