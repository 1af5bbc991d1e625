use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rand::Rng;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};

use chirp_store::SharedStore;

use crate::{channel::Channel, types::ChannelStatus};

/// Jitter fraction applied to each delay (+10 %).
const JITTER_FRACTION: f64 = 0.10;

/// Reconnect schedule for supervised channels.
///
/// Default: 5 s → 10 s → 20 s → … → 300 s (cap), 10 failed attempts in a row.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    pub base: Duration,
    pub max: Duration,
    pub max_attempts: u32,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(5),
            max: Duration::from_secs(300),
            max_attempts: 10,
        }
    }
}

impl Backoff {
    /// Delay before retry number `attempt` (1-based), jitter included.
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        let delay = self.base.saturating_mul(factor).min(self.max);
        let max_jitter = (delay.as_millis() as f64 * JITTER_FRACTION) as u64;
        if max_jitter == 0 {
            return delay;
        }
        delay + Duration::from_millis(rand::rng().random_range(0..=max_jitter))
    }
}

struct Entry {
    channel: Arc<dyn Channel>,
    restart: bool,
}

/// Owns the configured adapters and runs each one on its own task.
///
/// A channel registered with `restart = true` is reconnected with
/// exponential backoff whenever its `connect` loop returns; otherwise a
/// lost connection is logged and the adapter stays down.
pub struct ChannelManager {
    channels: HashMap<String, Entry>,
    backoff: Backoff,
    stopping: Arc<AtomicBool>,
}

impl ChannelManager {
    pub fn new() -> Self {
        Self {
            channels: HashMap::new(),
            backoff: Backoff::default(),
            stopping: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Register a channel adapter.
    ///
    /// If a channel with the same name is already registered it is replaced.
    pub fn register(&mut self, channel: Arc<dyn Channel>, restart: bool) {
        let name = channel.name().to_string();
        info!(channel = %name, restart, "registering channel adapter");
        self.channels.insert(name, Entry { channel, restart });
    }

    /// Start every registered channel on its own Tokio task.
    pub fn spawn_all(&self, store: SharedStore) -> Vec<JoinHandle<()>> {
        self.channels
            .iter()
            .map(|(name, entry)| {
                let name = name.clone();
                let channel = Arc::clone(&entry.channel);
                let restart = entry.restart;
                let store = Arc::clone(&store);
                let backoff = self.backoff;
                let stopping = Arc::clone(&self.stopping);
                tokio::spawn(async move {
                    supervise(&name, channel, restart, store, backoff, stopping).await;
                })
            })
            .collect()
    }

    /// Stop every channel. Supervised channels are not restarted afterwards.
    ///
    /// Errors are logged but do not abort disconnection of remaining channels.
    pub async fn disconnect_all(&self) {
        self.stopping.store(true, Ordering::SeqCst);
        for (name, entry) in &self.channels {
            info!(channel = %name, "disconnecting channel");
            if let Err(e) = entry.channel.disconnect().await {
                warn!(channel = %name, error = %e, "error while disconnecting channel");
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Channel>> {
        self.channels.get(name).map(|e| Arc::clone(&e.channel))
    }

    /// Return the current [`ChannelStatus`] for every registered channel.
    ///
    /// The returned `Vec` is sorted by channel name for deterministic output.
    pub fn statuses(&self) -> Vec<(String, ChannelStatus)> {
        let mut result: Vec<(String, ChannelStatus)> = self
            .channels
            .iter()
            .map(|(name, e)| (name.clone(), e.channel.status()))
            .collect();
        result.sort_by(|a, b| a.0.cmp(&b.0));
        result
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

impl Default for ChannelManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Run one channel's connect loop, restarting it if asked to.
///
/// A session that ended cleanly resets the failure counter.
async fn supervise(
    name: &str,
    channel: Arc<dyn Channel>,
    restart: bool,
    store: SharedStore,
    backoff: Backoff,
    stopping: Arc<AtomicBool>,
) {
    let mut failures = 0u32;

    loop {
        info!(channel = %name, "connecting channel");
        let result = channel.connect(Arc::clone(&store)).await;

        if stopping.load(Ordering::SeqCst) {
            info!(channel = %name, "channel stopped");
            return;
        }

        match &result {
            Ok(()) => {
                warn!(channel = %name, "channel connection closed");
                failures = 0;
            }
            Err(e) => {
                error!(channel = %name, error = %e, "channel failed");
                failures += 1;
            }
        }

        if !restart {
            return;
        }
        if failures >= backoff.max_attempts {
            error!(
                channel = %name,
                attempts = failures,
                "giving up on channel after repeated failures"
            );
            return;
        }

        let delay = backoff.delay(failures.max(1));
        warn!(
            channel = %name,
            retry_after_ms = delay.as_millis() as u64,
            "restarting channel"
        );
        sleep(delay).await;
        if stopping.load(Ordering::SeqCst) {
            return;
        }
    }
}
