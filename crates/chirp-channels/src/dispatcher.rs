//! Channel-agnostic dispatch: match an inbound message against the plugin
//! registry and route the reply back through the originating adapter.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use chirp_core::config::{BotConfig, MatchMode};
use chirp_core::types::Message;
use chirp_plugins::{Deferred, MatchContext, Registry};
use chirp_store::SharedStore;

use crate::channel::ReplySink;

/// What a single [`Dispatcher::dispatch`] call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The message came from the adapter itself.
    Ignored,
    /// No plugin wanted the message.
    NoMatch,
    /// `lines` immediate sends succeeded; `deferred` replies were scheduled.
    Replied { lines: usize, deferred: usize },
}

/// Shared by every adapter (pass as `Arc<Dispatcher>`).
pub struct Dispatcher {
    registry: Arc<Registry>,
    store: SharedStore,
    identity: String,
    mode: MatchMode,
    deferred: TaskTracker,
}

struct Resolved {
    text: String,
    deferred: Vec<Deferred>,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<Registry>,
        store: SharedStore,
        identity: impl Into<String>,
        mode: MatchMode,
    ) -> Self {
        Self {
            registry,
            store,
            identity: identity.into(),
            mode,
            deferred: TaskTracker::new(),
        }
    }

    pub fn from_config(registry: Arc<Registry>, store: SharedStore, bot: &BotConfig) -> Self {
        Self::new(registry, store, bot.identity.clone(), bot.match_mode)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// Addressing token plugins look for in message bodies.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Run the registry against `msg` and send the reply to `msg.to`.
    ///
    /// Immediate lines are sent, in order, before any deferred reply is
    /// spawned. Deferred replies run detached and are not cancelled.
    pub async fn dispatch(
        &self,
        self_id: &str,
        msg: &Message,
        sink: Arc<dyn ReplySink>,
    ) -> DispatchOutcome {
        if msg.from == self_id {
            return DispatchOutcome::Ignored;
        }

        let ctx = MatchContext {
            service: msg.service,
            self_id,
            identity: &self.identity,
        };

        let Some(resolved) = self.resolve(&ctx, msg).await else {
            return DispatchOutcome::NoMatch;
        };

        let lines = if resolved.text.is_empty() {
            0
        } else {
            send_lines(sink.as_ref(), &msg.to, &resolved.text).await
        };

        let deferred = resolved.deferred.len();
        for producer in resolved.deferred {
            self.spawn_deferred(producer, Arc::clone(&sink), msg.to.clone());
        }

        debug!(
            service = %msg.service,
            target = %msg.to,
            lines,
            deferred,
            "dispatch complete"
        );
        DispatchOutcome::Replied { lines, deferred }
    }

    /// Invoke matching plugins according to the match mode.
    ///
    /// In the default [`MatchMode::LastWins`] every matching plugin runs but
    /// only the reply of the last one (in registration order) is kept.
    async fn resolve(&self, ctx: &MatchContext<'_>, msg: &Message) -> Option<Resolved> {
        let mut kept: Option<Resolved> = None;

        for plugin in self.registry.iter() {
            if !plugin.matches(ctx, &msg.body) {
                continue;
            }
            debug!(plugin = %plugin.name(), from = %msg.from, "plugin matched");

            plugin.set_store(Arc::clone(&self.store));
            let reply = plugin.process(&msg.from, &msg.body).await;

            match self.mode {
                MatchMode::LastWins => {
                    kept = Some(Resolved {
                        text: reply.text,
                        deferred: reply.deferred.into_iter().collect(),
                    });
                }
                MatchMode::FirstWins => {
                    return Some(Resolved {
                        text: reply.text,
                        deferred: reply.deferred.into_iter().collect(),
                    });
                }
                MatchMode::Aggregate => {
                    let acc = kept.get_or_insert_with(|| Resolved {
                        text: String::new(),
                        deferred: Vec::new(),
                    });
                    if !reply.text.is_empty() {
                        if !acc.text.is_empty() {
                            acc.text.push('\n');
                        }
                        acc.text.push_str(&reply.text);
                    }
                    acc.deferred.extend(reply.deferred);
                }
            }
        }

        kept
    }

    fn spawn_deferred(&self, producer: Deferred, sink: Arc<dyn ReplySink>, target: String) {
        self.deferred.spawn(async move {
            let text = producer.await;
            if text.is_empty() {
                return;
            }
            let sent = send_lines(sink.as_ref(), &target, &text).await;
            debug!(target = %target, lines = sent, "deferred reply delivered");
        });
    }

    /// Deferred replies still pending.
    pub fn outstanding(&self) -> usize {
        self.deferred.len()
    }

    /// Wait up to `grace` for pending deferred replies. Nothing is cancelled;
    /// returns `false` if some were still running when the grace period ended.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        self.deferred.close();
        let pending = self.deferred.len();
        if pending > 0 {
            info!(pending, grace_secs = grace.as_secs(), "waiting for deferred replies");
        }
        tokio::time::timeout(grace, self.deferred.wait()).await.is_ok()
    }
}

/// Send `text` one line at a time, skipping blank lines.
///
/// Stops at the first failed send (the transport is most likely gone) and
/// returns how many lines went out.
pub async fn send_lines(sink: &dyn ReplySink, target: &str, text: &str) -> usize {
    let mut sent = 0;
    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        if let Err(e) = sink.send(target, line).await {
            warn!(target, error = %e, "reply send failed");
            break;
        }
        sent += 1;
    }
    sent
}
