/// One parsed IRC protocol line: `[:prefix] COMMAND params... [:trailing]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrcMessage {
    pub prefix: Option<String>,
    /// Upper-cased command or three-digit numeric.
    pub command: String,
    /// Middle params followed by the trailing param, if any.
    pub params: Vec<String>,
}

impl IrcMessage {
    /// Returns `None` for blank lines and lines without a command.
    pub fn parse(line: &str) -> Option<Self> {
        let mut rest = line.trim_end_matches(['\r', '\n']);

        // IRCv3 message tags are not used.
        if rest.starts_with('@') {
            rest = rest.split_once(' ').map(|(_, r)| r)?;
        }

        let prefix = match rest.strip_prefix(':') {
            Some(p) => {
                let (prefix, r) = p.split_once(' ')?;
                rest = r;
                Some(prefix.to_string())
            }
            None => None,
        };

        let rest = rest.trim_start();
        let (command, mut rest) = match rest.split_once(' ') {
            Some((c, r)) => (c, r),
            None => (rest, ""),
        };
        if command.is_empty() {
            return None;
        }

        let mut params = Vec::new();
        loop {
            rest = rest.trim_start_matches(' ');
            if rest.is_empty() {
                break;
            }
            if let Some(trailing) = rest.strip_prefix(':') {
                params.push(trailing.to_string());
                break;
            }
            match rest.split_once(' ') {
                Some((p, r)) => {
                    params.push(p.to_string());
                    rest = r;
                }
                None => {
                    params.push(rest.to_string());
                    break;
                }
            }
        }

        Some(Self {
            prefix,
            command: command.to_ascii_uppercase(),
            params,
        })
    }

    /// Nick part of a `nick!user@host` prefix.
    pub fn nick(&self) -> Option<&str> {
        let prefix = self.prefix.as_deref()?;
        Some(prefix.split(['!', '@']).next().unwrap_or(prefix))
    }

    pub fn param(&self, i: usize) -> Option<&str> {
        self.params.get(i).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn privmsg_with_prefix_and_trailing() {
        let m = IrcMessage::parse(":alice!~a@host PRIVMSG #rust :hello there\r\n").unwrap();
        assert_eq!(m.prefix.as_deref(), Some("alice!~a@host"));
        assert_eq!(m.nick(), Some("alice"));
        assert_eq!(m.command, "PRIVMSG");
        assert_eq!(m.params, vec!["#rust", "hello there"]);
    }

    #[test]
    fn numeric_and_bare_command() {
        let m = IrcMessage::parse(":irc.example 001 chirp :Welcome").unwrap();
        assert_eq!(m.command, "001");
        assert_eq!(m.nick(), Some("irc.example"));

        let m = IrcMessage::parse("ping abc").unwrap();
        assert_eq!(m.command, "PING");
        assert_eq!(m.param(0), Some("abc"));
    }

    #[test]
    fn tags_are_skipped() {
        let m = IrcMessage::parse("@time=2024-01-01T00:00:00Z :bob PRIVMSG chirp :hi").unwrap();
        assert_eq!(m.nick(), Some("bob"));
        assert_eq!(m.params, vec!["chirp", "hi"]);
    }

    #[test]
    fn empty_trailing_is_kept() {
        let m = IrcMessage::parse(":bob PRIVMSG #c :").unwrap();
        assert_eq!(m.params, vec!["#c", ""]);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(IrcMessage::parse("").is_none());
        assert!(IrcMessage::parse(":onlyprefix").is_none());
    }
}
