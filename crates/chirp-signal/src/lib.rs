//! Signal adapter speaking newline-delimited JSON-RPC to a local
//! signal-cli daemon over a Unix socket.

pub mod adapter;
pub mod codec;
pub mod error;
pub mod frames;
pub mod methods;

pub use adapter::{SignalChannel, SignalSink, ACCOUNT_KEY};
pub use codec::SignalCodec;
pub use error::SignalError;
pub use frames::{is_uuid, parse_frame, random_id, ChatEvent, SendParams, SendRequest};
