use async_trait::async_trait;

use chirp_store::{get_or_default, set_logged, SharedStore};

use crate::error::Result;
use crate::plugin::{MatchContext, Plugin, Reply, StoreSlot, Trigger};

const KEY_PREFIX: &str = "note:";

/// Remember a line of text under a key, or recall it.
pub struct NotePlugin {
    trigger: Trigger,
    store: StoreSlot,
}

impl NotePlugin {
    pub fn new() -> Result<Self> {
        Ok(Self {
            trigger: Trigger::new("note", r"(?i)\bnote\s+(\S+)(?:\s+(.+))?", true)?,
            store: StoreSlot::default(),
        })
    }
}

#[async_trait]
impl Plugin for NotePlugin {
    fn name(&self) -> &str {
        "note"
    }

    fn description(&self) -> &str {
        "remember or recall a note"
    }

    fn pattern(&self) -> &str {
        "<identity> note <key> [text]"
    }

    fn matches(&self, ctx: &MatchContext<'_>, body: &str) -> bool {
        self.trigger.is_match(ctx, body)
    }

    fn set_store(&self, store: SharedStore) {
        self.store.set(store);
    }

    async fn process(&self, _from: &str, body: &str) -> Reply {
        let Some(caps) = self.trigger.regex().captures(body) else {
            return Reply::none();
        };
        let Some(store) = self.store.get() else {
            return Reply::text("sorry, I have nowhere to keep notes");
        };

        let key = format!("{KEY_PREFIX}{}", caps[1].to_lowercase());
        match caps.get(2).map(|m| m.as_str().trim()) {
            Some(text) if !text.is_empty() => {
                set_logged(store.as_ref(), &key, text);
                Reply::text(format!("noted {}", &caps[1]))
            }
            _ => {
                let value = get_or_default(store.as_ref(), &key);
                if value.is_empty() {
                    Reply::text(format!("I have no note called {}", &caps[1]))
                } else {
                    Reply::text(value)
                }
            }
        }
    }
}
