use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical transport name used for logging and plugin context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Service {
    Signal,
    Irc,
    Matrix,
    Xmpp,
    Sms,
    Notify,
}

impl Service {
    pub fn as_str(&self) -> &'static str {
        match self {
            Service::Signal => "signal",
            Service::Irc => "irc",
            Service::Matrix => "matrix",
            Service::Xmpp => "xmpp",
            Service::Sms => "sms",
            Service::Notify => "notify",
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One normalized inbound chat event.
///
/// Lives only for the duration of a dispatch; never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub service: Service,

    /// Routing target for replies: the room/channel/group for group
    /// conversations, the sender for direct ones.
    pub to: String,

    /// Transport-native identity of the sender.
    pub from: String,

    pub body: String,

    pub received_at: DateTime<Utc>,
}

impl Message {
    pub fn new(
        service: Service,
        to: impl Into<String>,
        from: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            service,
            to: to.into(),
            from: from.into(),
            body: body.into(),
            received_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_serializes_lowercase() {
        let json = serde_json::to_string(&Service::Matrix).unwrap();
        assert_eq!(json, r#""matrix""#);
        assert_eq!(Service::Sms.to_string(), "sms");
    }

    #[test]
    fn message_new_keeps_fields() {
        let msg = Message::new(Service::Irc, "#ops", "alice", "hi");
        assert_eq!(msg.to, "#ops");
        assert_eq!(msg.from, "alice");
        assert_eq!(msg.body, "hi");
    }
}
