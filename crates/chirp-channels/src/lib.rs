pub mod channel;
pub mod dispatcher;
pub mod error;
pub mod manager;
pub mod outbox;
pub mod types;

pub use channel::{Channel, ReplySink};
pub use dispatcher::{send_lines, DispatchOutcome, Dispatcher};
pub use error::ChannelError;
pub use manager::{Backoff, ChannelManager};
pub use outbox::Outbox;
pub use types::{ChannelStatus, StatusCell};
