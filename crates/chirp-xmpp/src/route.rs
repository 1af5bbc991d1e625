//! Addressing rules for inbound XMPP messages, on plain JID strings.

/// Bare JID (`user@server`) of a full JID (`user@server/resource`).
pub fn bare_jid(jid: &str) -> &str {
    jid.split('/').next().unwrap_or(jid)
}

/// Resource part, if any. For a MUC occupant this is the nick.
pub fn resource(jid: &str) -> Option<&str> {
    jid.split_once('/').map(|(_, r)| r).filter(|r| !r.is_empty())
}

/// Local part (`user`) of a JID.
pub fn local_part(jid: &str) -> &str {
    let bare = bare_jid(jid);
    bare.split('@').next().unwrap_or(bare)
}

/// Where a reply goes and who the sender is, for one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub to: String,
    pub from: String,
    /// The identity our own messages carry in this context.
    pub self_id: String,
}

/// `own_jid` is our bare JID; our MUC nick is its local part.
pub fn route(sender: &str, groupchat: bool, own_jid: &str) -> Route {
    if groupchat {
        let room = bare_jid(sender);
        Route {
            to: room.to_string(),
            from: resource(sender).unwrap_or(room).to_string(),
            self_id: local_part(own_jid).to_string(),
        }
    } else {
        let peer = bare_jid(sender);
        Route {
            to: peer.to_string(),
            from: peer.to_string(),
            self_id: bare_jid(own_jid).to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jid_parts() {
        assert_eq!(bare_jid("user@example.com/phone"), "user@example.com");
        assert_eq!(bare_jid("user@example.com"), "user@example.com");
        assert_eq!(resource("room@muc.example.com/alice"), Some("alice"));
        assert_eq!(resource("user@example.com"), None);
        assert_eq!(local_part("chirp@example.com/bot"), "chirp");
    }

    #[test]
    fn chat_replies_to_bare_sender() {
        let r = route("alice@example.com/laptop", false, "chirp@example.com");
        assert_eq!(r.to, "alice@example.com");
        assert_eq!(r.from, "alice@example.com");
        assert_eq!(r.self_id, "chirp@example.com");
    }

    #[test]
    fn groupchat_replies_to_room() {
        let r = route("ops@muc.example.com/alice", true, "chirp@example.com");
        assert_eq!(r.to, "ops@muc.example.com");
        assert_eq!(r.from, "alice");
        assert_eq!(r.self_id, "chirp");
    }

    #[test]
    fn own_room_echo_matches_self_id() {
        let r = route("ops@muc.example.com/chirp", true, "chirp@example.com");
        assert_eq!(r.from, r.self_id);
    }
}
