//! XMPP adapter (client-to-server, `tokio-xmpp`).

pub mod adapter;
pub mod error;
pub mod route;

pub use adapter::XmppChannel;
pub use error::XmppError;
