use async_trait::async_trait;

use chirp_store::SharedStore;

use crate::error::Result;
use crate::plugin::{MatchContext, Plugin, Reply, Trigger};

pub struct VersionPlugin {
    trigger: Trigger,
}

impl VersionPlugin {
    pub fn new() -> Result<Self> {
        Ok(Self {
            trigger: Trigger::new("version", r"(?i)\bversion\b", true)?,
        })
    }
}

#[async_trait]
impl Plugin for VersionPlugin {
    fn name(&self) -> &str {
        "version"
    }

    fn description(&self) -> &str {
        "report the running version"
    }

    fn pattern(&self) -> &str {
        "<identity> version"
    }

    fn matches(&self, ctx: &MatchContext<'_>, body: &str) -> bool {
        self.trigger.is_match(ctx, body)
    }

    fn set_store(&self, _store: SharedStore) {}

    async fn process(&self, _from: &str, _body: &str) -> Reply {
        Reply::text(format!("chirp {}", env!("CARGO_PKG_VERSION")))
    }
}
