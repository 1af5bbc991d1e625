use std::fmt;
use std::future::Future;
use std::sync::RwLock;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use regex::Regex;
use serde::Serialize;

use chirp_core::types::Service;
use chirp_store::SharedStore;

use crate::error::PluginError;

/// A delayed reply: resolves to the text to send once it becomes available.
///
/// An empty result means "nothing to say" and is not sent.
pub type Deferred = BoxFuture<'static, String>;

/// What a plugin hands back from [`Plugin::process`].
#[derive(Default)]
pub struct Reply {
    /// Sent right away, one transport message per line.
    pub text: String,
    /// Spawned after `text` went out; never awaited by the dispatcher.
    pub deferred: Option<Deferred>,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            deferred: None,
        }
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_deferred<F>(mut self, fut: F) -> Self
    where
        F: Future<Output = String> + Send + 'static,
    {
        self.deferred = Some(Box::pin(fut));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.deferred.is_none()
    }
}

impl fmt::Debug for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reply")
            .field("text", &self.text)
            .field("deferred", &self.deferred.is_some())
            .finish()
    }
}

/// Who is asking: the transport plus the bot's identities on it.
#[derive(Debug, Clone, Copy)]
pub struct MatchContext<'a> {
    pub service: Service,
    /// The adapter's own transport identity (nick, UUID, JID, …).
    pub self_id: &'a str,
    /// Configured addressing token (`bot.identity`).
    pub identity: &'a str,
}

impl MatchContext<'_> {
    /// Raw substring test for the identity token, not a word-boundary match.
    pub fn is_addressed(&self, body: &str) -> bool {
        !self.identity.is_empty() && body.contains(self.identity)
    }
}

/// Message responder.
///
/// Plugins hold no per-message state; anything that must outlive a call goes
/// through the injected store. The same instance serves every adapter.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Short stable identifier (e.g. `"remind"`).
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Human-readable trigger description, shown by `help`. Not used for matching.
    fn pattern(&self) -> &str;

    /// Pure predicate: does this plugin want to answer `body`?
    fn matches(&self, ctx: &MatchContext<'_>, body: &str) -> bool;

    /// Hand the plugin the store it should use for the upcoming `process` call.
    fn set_store(&self, store: SharedStore);

    /// Produce the immediate reply and an optional deferred one.
    ///
    /// Failures are reported as reply text; there is no error channel.
    async fn process(&self, from: &str, body: &str) -> Reply;
}

/// Listing entry for `help` and the `plugins` CLI command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginInfo {
    pub name: String,
    pub pattern: String,
    pub description: String,
}

impl PluginInfo {
    pub fn of(plugin: &dyn Plugin) -> Self {
        Self {
            name: plugin.name().to_string(),
            pattern: plugin.pattern().to_string(),
            description: plugin.description().to_string(),
        }
    }
}

/// Interior-mutable holder for the store handed over by `set_store`.
#[derive(Default)]
pub struct StoreSlot(RwLock<Option<SharedStore>>);

impl StoreSlot {
    pub fn set(&self, store: SharedStore) {
        let mut slot = self.0.write().unwrap_or_else(|p| p.into_inner());
        *slot = Some(store);
    }

    pub fn get(&self) -> Option<SharedStore> {
        self.0.read().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

/// Precompiled trigger regex, optionally gated on being addressed.
#[derive(Debug, Clone)]
pub struct Trigger {
    regex: Regex,
    addressed: bool,
}

impl Trigger {
    pub fn new(plugin: &str, pattern: &str, addressed: bool) -> Result<Self, PluginError> {
        let regex = Regex::new(pattern).map_err(|source| PluginError::InvalidPattern {
            plugin: plugin.to_string(),
            source,
        })?;
        Ok(Self { regex, addressed })
    }

    pub fn is_match(&self, ctx: &MatchContext<'_>, body: &str) -> bool {
        (!self.addressed || ctx.is_addressed(body)) && self.regex.is_match(body)
    }

    pub fn regex(&self) -> &Regex {
        &self.regex
    }
}
