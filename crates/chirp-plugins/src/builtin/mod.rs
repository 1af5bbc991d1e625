//! Plugins that ship with the bot and need nothing beyond the store.

pub mod help;
pub mod karma;
pub mod note;
pub mod remind;
pub mod version;
