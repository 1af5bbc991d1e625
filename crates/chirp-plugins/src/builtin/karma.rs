use async_trait::async_trait;

use chirp_store::{get_or_default, set_logged, SharedStore};

use crate::error::Result;
use crate::plugin::{MatchContext, Plugin, Reply, StoreSlot, Trigger};

const KEY_PREFIX: &str = "karma:";

/// `thing++` / `thing--` counters kept in the store.
pub struct KarmaPlugin {
    trigger: Trigger,
    store: StoreSlot,
}

impl KarmaPlugin {
    pub fn new() -> Result<Self> {
        Ok(Self {
            trigger: Trigger::new("karma", r"([^\s+-][^\s]*?)(\+\+|--)(?:\s|$)", false)?,
            store: StoreSlot::default(),
        })
    }
}

#[async_trait]
impl Plugin for KarmaPlugin {
    fn name(&self) -> &str {
        "karma"
    }

    fn description(&self) -> &str {
        "adjust karma for a word"
    }

    fn pattern(&self) -> &str {
        "<word>++ | <word>--"
    }

    fn matches(&self, ctx: &MatchContext<'_>, body: &str) -> bool {
        self.trigger.is_match(ctx, body)
    }

    fn set_store(&self, store: SharedStore) {
        self.store.set(store);
    }

    async fn process(&self, from: &str, body: &str) -> Reply {
        let Some(store) = self.store.get() else {
            return Reply::text("sorry, karma is unavailable: no store");
        };

        let mut lines = Vec::new();
        for caps in self.trigger.regex().captures_iter(body) {
            let word = caps[1].to_lowercase();
            // Self-promotion only ever counts down.
            let delta: i64 = if &caps[2] == "++" && !word.eq_ignore_ascii_case(from) {
                1
            } else {
                -1
            };

            let key = format!("{KEY_PREFIX}{word}");
            let current = get_or_default(store.as_ref(), &key)
                .parse::<i64>()
                .unwrap_or(0);
            let updated = current.saturating_add(delta);
            set_logged(store.as_ref(), &key, &updated.to_string());
            lines.push(format!("{word} now has {updated} karma"));
        }

        Reply::text(lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chirp_core::types::Service;
    use chirp_store::{MemoryStore, Store};
    use std::sync::Arc;

    fn ctx() -> MatchContext<'static> {
        MatchContext {
            service: Service::Irc,
            self_id: "chirp",
            identity: "chirp",
        }
    }

    #[test]
    fn matches_increments_and_decrements() {
        let plugin = KarmaPlugin::new().unwrap();
        assert!(plugin.matches(&ctx(), "rust++"));
        assert!(plugin.matches(&ctx(), "meetings-- honestly"));
        assert!(!plugin.matches(&ctx(), "a + b - c"));
        assert!(!plugin.matches(&ctx(), "plain text"));
    }

    #[tokio::test]
    async fn counts_accumulate_in_store() {
        let plugin = KarmaPlugin::new().unwrap();
        let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());
        plugin.set_store(store.clone());

        plugin.process("alice", "Rust++").await;
        let reply = plugin.process("bob", "rust++ tea--").await;

        assert_eq!(reply.text, "rust now has 2 karma\ntea now has -1 karma");
        assert_eq!(store.get("karma:rust").unwrap(), "2");
    }

    #[tokio::test]
    async fn self_karma_goes_down() {
        let plugin = KarmaPlugin::new().unwrap();
        plugin.set_store(Arc::new(MemoryStore::new()));
        let reply = plugin.process("alice", "alice++").await;
        assert_eq!(reply.text, "alice now has -1 karma");
    }

    #[tokio::test]
    async fn counts_saturate_at_the_limits() {
        let plugin = KarmaPlugin::new().unwrap();
        let store = Arc::new(MemoryStore::with_entries([
            ("karma:up", i64::MAX.to_string()),
            ("karma:down", i64::MIN.to_string()),
        ]));
        plugin.set_store(store.clone());

        plugin.process("alice", "up++ down--").await;
        assert_eq!(store.get("karma:up").unwrap(), i64::MAX.to_string());
        assert_eq!(store.get("karma:down").unwrap(), i64::MIN.to_string());
    }

    #[tokio::test]
    async fn missing_store_is_reported_as_text() {
        let plugin = KarmaPlugin::new().unwrap();
        let reply = plugin.process("alice", "rust++").await;
        assert!(reply.text.starts_with("sorry"));
    }
}
