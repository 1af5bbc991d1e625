pub mod config;
pub mod error;
pub mod types;

pub use config::ChirpConfig;
pub use error::{ChirpError, Result};
pub use types::{Message, Service};
