use thiserror::Error;

#[derive(Debug, Error)]
pub enum PluginError {
    /// A plugin's trigger pattern failed to compile.
    #[error("Invalid pattern for plugin {plugin}: {source}")]
    InvalidPattern {
        plugin: String,
        #[source]
        source: regex::Error,
    },
}

pub type Result<T> = std::result::Result<T, PluginError>;
