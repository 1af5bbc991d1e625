pub mod builtin;
pub mod error;
pub mod plugin;
pub mod registry;

pub use error::PluginError;
pub use plugin::{Deferred, MatchContext, Plugin, PluginInfo, Reply, StoreSlot, Trigger};
pub use registry::Registry;
