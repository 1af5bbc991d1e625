use std::sync::Arc;

use tracing::debug;

use crate::builtin;
use crate::error::Result;
use crate::plugin::{MatchContext, Plugin, PluginInfo};

/// Ordered collection of plugins.
///
/// Registration order is precedence order. Built once at startup, then
/// shared read-only (pass as `Arc<Registry>`).
#[derive(Default)]
pub struct Registry {
    plugins: Vec<Arc<dyn Plugin>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The stock plugin set followed by `help` describing all of them.
    pub fn builtin() -> Result<Self> {
        let mut registry = Self::new();
        registry.register(Arc::new(builtin::version::VersionPlugin::new()?));
        registry.register(Arc::new(builtin::karma::KarmaPlugin::new()?));
        registry.register(Arc::new(builtin::note::NotePlugin::new()?));
        registry.register(Arc::new(builtin::remind::RemindPlugin::new()?));
        registry.with_help()
    }

    /// Append a plugin. Later registrations take precedence on overlap.
    pub fn register(&mut self, plugin: Arc<dyn Plugin>) {
        debug!(name = %plugin.name(), position = self.plugins.len(), "plugin registered");
        self.plugins.push(plugin);
    }

    /// Append a `help` plugin whose listing covers every plugin, itself included.
    pub fn with_help(mut self) -> Result<Self> {
        let help = builtin::help::HelpPlugin::new(Vec::new())?;
        let mut catalog = self.catalog();
        catalog.push(PluginInfo::of(&help));
        self.register(Arc::new(help.with_catalog(catalog)));
        Ok(self)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Plugin>> {
        self.plugins.iter()
    }

    /// Plugins whose predicate accepts `body`, in registration order.
    pub fn matching<'a>(
        &'a self,
        ctx: &'a MatchContext<'a>,
        body: &'a str,
    ) -> impl Iterator<Item = &'a Arc<dyn Plugin>> + 'a {
        self.plugins.iter().filter(move |p| p.matches(ctx, body))
    }

    pub fn catalog(&self) -> Vec<PluginInfo> {
        self.plugins.iter().map(|p| PluginInfo::of(p.as_ref())).collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}
