//! The slice of the `/sync` response the bot cares about.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SyncResponse {
    pub next_batch: String,
    #[serde(default)]
    pub rooms: Rooms,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Rooms {
    #[serde(default)]
    pub join: HashMap<String, JoinedRoom>,
    #[serde(default)]
    pub invite: HashMap<String, InvitedRoom>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JoinedRoom {
    #[serde(default)]
    pub timeline: Timeline,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Timeline {
    #[serde(default)]
    pub events: Vec<RoomEvent>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InvitedRoom {
    #[serde(default)]
    pub invite_state: InviteState,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InviteState {
    #[serde(default)]
    pub events: Vec<RoomEvent>,
}

/// Timeline and stripped state events share this shape.
#[derive(Debug, Clone, Deserialize)]
pub struct RoomEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub sender: String,
    #[serde(default)]
    pub state_key: Option<String>,
    #[serde(default)]
    pub content: Value,
}

/// A plain-text room message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextMessage {
    pub room_id: String,
    pub sender: String,
    pub body: String,
}

impl SyncResponse {
    /// Rooms `user_id` was invited to by `owner`, in no particular order.
    pub fn invites_from(&self, owner: &str, user_id: &str) -> Vec<String> {
        self.rooms
            .invite
            .iter()
            .filter(|(_, room)| {
                room.invite_state.events.iter().any(|ev| {
                    ev.event_type == "m.room.member"
                        && ev.sender == owner
                        && ev.state_key.as_deref() == Some(user_id)
                        && ev.content.get("membership").and_then(Value::as_str) == Some("invite")
                })
            })
            .map(|(room_id, _)| room_id.clone())
            .collect()
    }

    /// `m.text` messages in joined rooms, in timeline order per room.
    pub fn text_messages(&self) -> Vec<TextMessage> {
        let mut out = Vec::new();
        for (room_id, room) in &self.rooms.join {
            for ev in &room.timeline.events {
                if ev.event_type != "m.room.message" {
                    continue;
                }
                if ev.content.get("msgtype").and_then(Value::as_str) != Some("m.text") {
                    continue;
                }
                let Some(body) = ev.content.get("body").and_then(Value::as_str) else {
                    continue;
                };
                out.push(TextMessage {
                    room_id: room_id.clone(),
                    sender: ev.sender.clone(),
                    body: body.to_string(),
                });
            }
        }
        out
    }
}
