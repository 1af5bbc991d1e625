use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::methods;

const ID_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const ID_LEN: usize = 16;

/// Client → daemon send request.
/// Wire: `{ "jsonrpc": "2.0", "method": "send", "params": {...}, "id": "k3j9..." }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendRequest {
    pub jsonrpc: String,
    pub method: String,
    pub params: SendParams,
    pub id: String,
}

/// Exactly one of `recipient` / `groupId` is present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<Vec<String>>,
    #[serde(rename = "groupId", default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    pub message: String,
}

impl SendRequest {
    /// UUID-shaped targets are individual recipients, anything else a group id.
    pub fn new(target: &str, text: &str) -> Self {
        let params = if is_uuid(target) {
            SendParams {
                recipient: Some(vec![target.to_string()]),
                group_id: None,
                message: text.to_string(),
            }
        } else {
            SendParams {
                recipient: None,
                group_id: Some(target.to_string()),
                message: text.to_string(),
            }
        };
        Self {
            jsonrpc: methods::JSONRPC_VERSION.to_string(),
            method: methods::SEND.to_string(),
            params,
            id: random_id(),
        }
    }
}

/// Any daemon → client object. Responses and notifications other than
/// `receive` are parsed this far and then dropped.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundFrame {
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub params: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReceiveParams {
    pub envelope: Envelope,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    #[serde(default)]
    pub source_uuid: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub data_message: Option<DataMessage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataMessage {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub group_info: Option<GroupInfo>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupInfo {
    #[serde(default)]
    pub group_id: Option<String>,
}

/// One decoded chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEvent {
    /// Sender identity (UUID, or phone number on old daemons).
    pub sender: String,
    /// Where replies go: the group id for group messages, else the sender.
    pub target: String,
    pub body: String,
}

/// Decode one line into a chat event.
///
/// Blank lines, malformed JSON, methods other than `receive` and envelopes
/// without message text all yield `None`.
pub fn parse_frame(line: &str) -> Option<ChatEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let frame: InboundFrame = match serde_json::from_str(line) {
        Ok(f) => f,
        Err(e) => {
            debug!(error = %e, "discarding malformed signal frame");
            return None;
        }
    };
    if frame.method.as_deref() != Some(methods::RECEIVE) {
        return None;
    }

    let params: ReceiveParams = serde_json::from_value(frame.params?).ok()?;
    let envelope = params.envelope;
    let data = envelope.data_message?;
    let body = data.message.filter(|m| !m.is_empty())?;

    let sender = envelope
        .source_uuid
        .filter(|s| !s.is_empty())
        .or(envelope.source.filter(|s| !s.is_empty()))?;

    let target = data
        .group_info
        .and_then(|g| g.group_id)
        .filter(|g| !g.is_empty())
        .unwrap_or_else(|| sender.clone());

    Some(ChatEvent {
        sender,
        target,
        body,
    })
}

/// Hyphenated 8-4-4-4-12 hex form only.
pub fn is_uuid(s: &str) -> bool {
    s.len() == 36 && Uuid::try_parse(s).is_ok()
}

/// 16-character lowercase alphanumeric request id.
pub fn random_id() -> String {
    let mut rng = rand::rng();
    (0..ID_LEN)
        .map(|_| ID_CHARSET[rng.random_range(0..ID_CHARSET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALICE: &str = "6f1c2b9a-3d4e-4f5a-8b6c-7d8e9f0a1b2c";

    #[test]
    fn uuid_shape() {
        assert!(is_uuid(ALICE));
        assert!(is_uuid(&ALICE.to_uppercase()));
        assert!(!is_uuid("6f1c2b9a3d4e4f5a8b6c7d8e9f0a1b2c"));
        assert!(!is_uuid("aGVsbG8gd29ybGQgZ3JvdXA="));
        assert!(!is_uuid(""));
    }

    #[test]
    fn ids_are_lowercase_alphanumeric() {
        let id = random_id();
        assert_eq!(id.len(), 16);
        assert!(id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
        assert_ne!(random_id(), random_id());
    }

    #[test]
    fn direct_message_targets_sender() {
        let line = format!(
            r#"{{"jsonrpc":"2.0","method":"receive","params":{{"envelope":{{"sourceUuid":"{ALICE}","dataMessage":{{"message":"hi"}}}}}}}}"#
        );
        let ev = parse_frame(&line).unwrap();
        assert_eq!(ev.sender, ALICE);
        assert_eq!(ev.target, ALICE);
        assert_eq!(ev.body, "hi");
    }

    #[test]
    fn group_message_targets_group() {
        let line = format!(
            r#"{{"method":"receive","params":{{"envelope":{{"sourceUuid":"{ALICE}","dataMessage":{{"message":"hi","groupInfo":{{"groupId":"Z3JvdXA="}}}}}}}}}}"#
        );
        let ev = parse_frame(&line).unwrap();
        assert_eq!(ev.sender, ALICE);
        assert_eq!(ev.target, "Z3JvdXA=");
    }

    #[test]
    fn legacy_source_field_is_used() {
        let line = r#"{"method":"receive","params":{"envelope":{"source":"+15550100","dataMessage":{"message":"yo"}}}}"#;
        assert_eq!(parse_frame(line).unwrap().sender, "+15550100");
    }

    #[test]
    fn non_chat_frames_are_dropped() {
        assert!(parse_frame("").is_none());
        assert!(parse_frame("   ").is_none());
        assert!(parse_frame("{not json").is_none());
        assert!(parse_frame(r#"{"jsonrpc":"2.0","method":"ping"}"#).is_none());
        assert!(parse_frame(r#"{"jsonrpc":"2.0","result":{},"id":"abc"}"#).is_none());
        // receipts and typing notifications carry no dataMessage
        assert!(parse_frame(
            r#"{"method":"receive","params":{"envelope":{"sourceUuid":"x","receiptMessage":{}}}}"#
        )
        .is_none());
        assert!(parse_frame(
            r#"{"method":"receive","params":{"envelope":{"sourceUuid":"x","dataMessage":{"message":""}}}}"#
        )
        .is_none());
    }
}
