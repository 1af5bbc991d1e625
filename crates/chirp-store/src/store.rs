use std::sync::Arc;

use tracing::warn;

use crate::error::StoreError;

/// String key/value capability shared by every adapter and plugin.
///
/// There is no locking contract: concurrent `set` calls on the same key race
/// and the last write wins. Callers must not rely on read-after-write
/// consistency across adapters.
pub trait Store: Send + Sync {
    /// Return the stored value, or [`StoreError::NotFound`].
    fn get(&self, key: &str) -> Result<String, StoreError>;

    /// Overwrite `key` unconditionally, creating it if needed.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

pub type SharedStore = Arc<dyn Store>;

/// Read `key`, treating a missing key or a backend failure as the empty string.
pub fn get_or_default(store: &dyn Store, key: &str) -> String {
    match store.get(key) {
        Ok(value) => value,
        Err(StoreError::NotFound { .. }) => String::new(),
        Err(e) => {
            warn!(key, error = %e, "store read failed, using empty value");
            String::new()
        }
    }
}

/// Best-effort write: failures are logged and swallowed.
pub fn set_logged(store: &dyn Store, key: &str, value: &str) {
    if let Err(e) = store.set(key, value) {
        warn!(key, error = %e, "store write failed");
    }
}

/// Read a key that must be present and non-empty (connection credentials).
pub fn require(store: &dyn Store, key: &str) -> Result<String, StoreError> {
    match store.get(key) {
        Ok(value) if !value.is_empty() => Ok(value),
        Ok(_) => Err(StoreError::NotFound {
            key: key.to_string(),
        }),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    #[test]
    fn get_or_default_on_missing_key_is_empty() {
        let store = MemoryStore::new();
        assert_eq!(get_or_default(&store, "absent"), "");
    }

    #[test]
    fn require_rejects_empty_values() {
        let store = MemoryStore::new();
        store.set("matrix:access_token", "").unwrap();
        let err = require(&store, "matrix:access_token").unwrap_err();
        assert!(err.is_not_found());

        store.set("matrix:access_token", "secret").unwrap();
        assert_eq!(require(&store, "matrix:access_token").unwrap(), "secret");
    }

    #[test]
    fn set_logged_overwrites() {
        let store = MemoryStore::new();
        set_logged(&store, "k", "one");
        set_logged(&store, "k", "two");
        assert_eq!(store.get("k").unwrap(), "two");
    }
}
