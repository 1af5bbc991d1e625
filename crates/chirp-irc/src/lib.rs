pub mod adapter;
pub mod error;
pub mod handler;
pub mod message;

pub use adapter::IrcChannel;
pub use error::IrcError;
pub use handler::{Action, Session};
pub use message::IrcMessage;
