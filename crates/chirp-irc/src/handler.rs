//! Per-connection IRC state machine.
//!
//! Pure: takes one line, returns what the adapter should do about it. The
//! socket, codec and dispatcher live in [`crate::adapter`].

use tracing::{debug, info, warn};

use chirp_core::types::{Message, Service};

use crate::message::IrcMessage;

const RPL_WELCOME: &str = "001";
const ERR_NICKNAMEINUSE: &str = "433";

/// Follow-up produced for one inbound line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Write this raw line to the server.
    Send(String),
    /// Hand this chat message to the dispatcher.
    Dispatch(Message),
}

#[derive(Debug, Clone)]
pub struct Session {
    nick: String,
    rooms: Vec<String>,
    registered: bool,
}

impl Session {
    pub fn new(nick: impl Into<String>, rooms: Vec<String>) -> Self {
        Self {
            nick: nick.into(),
            rooms,
            registered: false,
        }
    }

    /// Our current nick, which is also our self identity for dispatch.
    pub fn nick(&self) -> &str {
        &self.nick
    }

    pub fn is_registered(&self) -> bool {
        self.registered
    }

    /// Registration burst sent right after the TCP connection is up.
    pub fn register(&self, user: Option<&str>, password: Option<&str>) -> Vec<String> {
        let mut lines = Vec::with_capacity(3);
        if let Some(pass) = password.filter(|p| !p.is_empty()) {
            lines.push(format!("PASS {pass}"));
        }
        let user = user.unwrap_or(&self.nick);
        lines.push(format!("NICK {}", self.nick));
        lines.push(format!("USER {user} 0 * :{user}"));
        lines
    }

    pub fn handle_line(&mut self, line: &str) -> Vec<Action> {
        // PONG echoes the PING argument verbatim.
        if let Some(param) = line.strip_prefix("PING ") {
            return vec![Action::Send(format!("PONG {}", param.trim_end()))];
        }

        let Some(msg) = IrcMessage::parse(line) else {
            return Vec::new();
        };

        match msg.command.as_str() {
            "PING" => {
                let param = msg.param(0).unwrap_or_default();
                vec![Action::Send(format!("PONG :{param}"))]
            }
            RPL_WELCOME => {
                self.registered = true;
                info!(nick = %self.nick, rooms = self.rooms.len(), "irc registered");
                self.rooms
                    .iter()
                    .map(|room| Action::Send(format!("JOIN {room}")))
                    .collect()
            }
            ERR_NICKNAMEINUSE if !self.registered => {
                self.nick.push('_');
                warn!(nick = %self.nick, "irc nick in use, retrying");
                vec![Action::Send(format!("NICK {}", self.nick))]
            }
            "NICK" => {
                if msg.nick() == Some(self.nick.as_str()) {
                    if let Some(new) = msg.param(0) {
                        self.nick = new.to_string();
                    }
                }
                Vec::new()
            }
            "INVITE" => match msg.param(1) {
                Some(room) => {
                    info!(room, by = msg.nick().unwrap_or_default(), "irc invite");
                    vec![Action::Send(format!("JOIN {room}"))]
                }
                None => Vec::new(),
            },
            "PRIVMSG" => self.privmsg(&msg).into_iter().collect(),
            "ERROR" => {
                warn!(reason = msg.param(0).unwrap_or_default(), "irc server error");
                Vec::new()
            }
            _ => {
                debug!(command = %msg.command, "irc line ignored");
                Vec::new()
            }
        }
    }

    fn privmsg(&self, msg: &IrcMessage) -> Option<Action> {
        let from = msg.nick()?;
        let target = msg.param(0)?;
        let body = msg.param(1)?;

        // A message to our nick is a direct message: answer the sender.
        let to = if target.eq_ignore_ascii_case(&self.nick) {
            from
        } else {
            target
        };
        Some(Action::Dispatch(Message::new(Service::Irc, to, from, body)))
    }
}

/// `PRIVMSG` line for `text`, with embedded line breaks flattened.
pub fn privmsg(target: &str, text: &str) -> String {
    let text: String = text
        .chars()
        .map(|c| if c == '\r' || c == '\n' { ' ' } else { c })
        .collect();
    format!("PRIVMSG {target} :{text}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new("chirp", vec!["#rust".into(), "#bots".into()])
    }

    fn sends(actions: &[Action]) -> Vec<&str> {
        actions
            .iter()
            .filter_map(|a| match a {
                Action::Send(line) => Some(line.as_str()),
                Action::Dispatch(_) => None,
            })
            .collect()
    }

    #[test]
    fn ping_gets_exactly_one_pong_and_no_dispatch() {
        let actions = session().handle_line("PING abc");
        assert_eq!(actions, vec![Action::Send("PONG abc".into())]);
    }

    #[test]
    fn prefixed_ping_is_answered() {
        let actions = session().handle_line(":irc.example PING :token");
        assert_eq!(actions, vec![Action::Send("PONG :token".into())]);
    }

    #[test]
    fn registration_burst() {
        let s = session();
        assert_eq!(
            s.register(None, Some("hunter2")),
            vec!["PASS hunter2", "NICK chirp", "USER chirp 0 * :chirp"]
        );
        assert_eq!(s.register(Some("bot"), None), vec!["NICK chirp", "USER bot 0 * :bot"]);
    }

    #[test]
    fn welcome_joins_every_room() {
        let mut s = session();
        let actions = s.handle_line(":irc.example 001 chirp :Welcome");
        assert_eq!(sends(&actions), vec!["JOIN #rust", "JOIN #bots"]);
        assert!(s.is_registered());
    }

    #[test]
    fn invite_joins_room() {
        let actions = session().handle_line(":bob!b@h INVITE chirp :#secret");
        assert_eq!(sends(&actions), vec!["JOIN #secret"]);
    }

    #[test]
    fn nick_collision_before_welcome() {
        let mut s = session();
        let actions = s.handle_line(":irc.example 433 * chirp :Nickname is already in use");
        assert_eq!(sends(&actions), vec!["NICK chirp_"]);
        assert_eq!(s.nick(), "chirp_");
    }

    #[test]
    fn channel_message_replies_to_channel() {
        let actions = session().handle_line(":alice!a@h PRIVMSG #rust :chirp help");
        let Action::Dispatch(msg) = &actions[0] else {
            panic!("expected dispatch");
        };
        assert_eq!(msg.service, Service::Irc);
        assert_eq!(msg.to, "#rust");
        assert_eq!(msg.from, "alice");
        assert_eq!(msg.body, "chirp help");
    }

    #[test]
    fn direct_message_replies_to_sender() {
        let actions = session().handle_line(":alice!a@h PRIVMSG Chirp :version");
        let Action::Dispatch(msg) = &actions[0] else {
            panic!("expected dispatch");
        };
        assert_eq!(msg.to, "alice");
    }

    #[test]
    fn unknown_lines_are_ignored() {
        assert!(session().handle_line(":irc.example 372 chirp :- motd").is_empty());
        assert!(session().handle_line("").is_empty());
    }

    #[test]
    fn privmsg_flattens_newlines() {
        assert_eq!(privmsg("#c", "a\r\nb"), "PRIVMSG #c :a  b");
    }
}
