use async_trait::async_trait;

use chirp_store::SharedStore;

use crate::error::Result;
use crate::plugin::{MatchContext, Plugin, PluginInfo, Reply, Trigger};

/// Lists every registered plugin with its trigger.
pub struct HelpPlugin {
    trigger: Trigger,
    catalog: Vec<PluginInfo>,
}

impl HelpPlugin {
    pub fn new(catalog: Vec<PluginInfo>) -> Result<Self> {
        Ok(Self {
            trigger: Trigger::new("help", r"(?i)\bhelp\b", true)?,
            catalog,
        })
    }

    pub fn with_catalog(mut self, catalog: Vec<PluginInfo>) -> Self {
        self.catalog = catalog;
        self
    }
}

#[async_trait]
impl Plugin for HelpPlugin {
    fn name(&self) -> &str {
        "help"
    }

    fn description(&self) -> &str {
        "list what I can do"
    }

    fn pattern(&self) -> &str {
        "<identity> help"
    }

    fn matches(&self, ctx: &MatchContext<'_>, body: &str) -> bool {
        self.trigger.is_match(ctx, body)
    }

    fn set_store(&self, _store: SharedStore) {}

    async fn process(&self, _from: &str, _body: &str) -> Reply {
        let text = self
            .catalog
            .iter()
            .map(|p| format!("{}: {} ({})", p.name, p.description, p.pattern))
            .collect::<Vec<_>>()
            .join("\n");
        Reply::text(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn one_line_per_plugin() {
        let catalog = vec![
            PluginInfo {
                name: "a".into(),
                pattern: "a".into(),
                description: "first".into(),
            },
            PluginInfo {
                name: "b".into(),
                pattern: "b".into(),
                description: "second".into(),
            },
        ];
        let help = HelpPlugin::new(catalog).unwrap();
        let reply = help.process("alice", "chirp help").await;
        assert_eq!(reply.text, "a: first (a)\nb: second (b)");
        assert!(reply.deferred.is_none());
    }
}
