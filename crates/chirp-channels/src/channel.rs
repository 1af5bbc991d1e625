use async_trait::async_trait;

use chirp_store::SharedStore;

use crate::{error::ChannelError, types::ChannelStatus};

/// Common interface implemented by every chat adapter (Signal, IRC, Matrix, …).
///
/// Implementations must be `Send + Sync` so they can be stored in a
/// [`ChannelManager`](crate::manager::ChannelManager) and driven from
/// multiple Tokio tasks.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Stable lowercase identifier for this channel (e.g. `"signal"`).
    ///
    /// Used as the key inside the manager; must be unique across adapters.
    fn name(&self) -> &str;

    /// Connect and run the event loop.
    ///
    /// Long-running: returns only when the connection is lost or could not be
    /// set up. Takes `&self` so `send` stays usable while the loop runs.
    async fn connect(&self, store: SharedStore) -> Result<(), ChannelError>;

    /// Ask a running `connect` loop to stop.
    async fn disconnect(&self) -> Result<(), ChannelError>;

    /// Deliver one text message to `target` (room, channel, group or user).
    async fn send(&self, target: &str, text: &str) -> Result<(), ChannelError>;

    /// Return the current runtime status without blocking.
    fn status(&self) -> ChannelStatus;
}

/// Outbound half of an adapter, handed to the dispatcher.
///
/// Cheap to share as `Arc<dyn ReplySink>` so deferred replies can still
/// reach the transport after the dispatch call returned. Once the transport
/// is gone, `send` must fail with an error rather than panic.
#[async_trait]
pub trait ReplySink: Send + Sync {
    async fn send(&self, target: &str, text: &str) -> Result<(), ChannelError>;
}
