//! Matrix adapter over the client-server REST API (`/sync` long polling).

pub mod adapter;
pub mod client;
pub mod error;
pub mod render;
pub mod sync;

pub use adapter::{MatrixChannel, ACCESS_TOKEN_KEY, NEXT_BATCH_KEY, USER_ID_KEY};
pub use client::MatrixClient;
pub use error::MatrixError;
