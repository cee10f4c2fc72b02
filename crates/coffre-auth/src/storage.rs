//! Host local storage for persisted authentication state.
//!
//! The original client keeps three well-known entries in browser local
//! storage; hosts implement [`LocalStore`] over whatever durable
//! string-keyed storage they have. Values are plain strings: tokens are
//! opaque to us, and the unlock marker is base64 ciphertext. Nothing
//! stored here can decrypt the vault on its own.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::AuthError;

/// Storage key for the bearer access token.
pub const ACCESS_TOKEN_KEY: &str = "token";
/// Storage key for the refresh token.
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";
/// Storage key for the encrypted unlock marker.
pub const UNLOCK_MARKER_KEY: &str = "encryptionTestString";

/// Durable string-keyed storage provided by the host.
pub trait LocalStore: Send + Sync {
    /// The stored value for `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Storage` if the backing store cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, AuthError>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Storage` if the backing store cannot be
    /// written.
    fn set(&self, key: &str, value: &str) -> Result<(), AuthError>;

    /// Remove `key`. Removing an absent key is not an error.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Storage` if the backing store cannot be
    /// written.
    fn remove(&self, key: &str) -> Result<(), AuthError>;
}

/// In-memory [`LocalStore`] for tests and ephemeral profiles.
#[derive(Debug, Default)]
pub struct MemoryLocalStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryLocalStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, AuthError> {
        self.entries
            .lock()
            .map_err(|_| AuthError::Storage("local store lock poisoned".into()))
    }
}

impl LocalStore for MemoryLocalStore {
    fn get(&self, key: &str) -> Result<Option<String>, AuthError> {
        Ok(self.entries()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), AuthError> {
        self.entries()?.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), AuthError> {
        self.entries()?.remove(key);
        Ok(())
    }
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get_roundtrip() {
        let store = MemoryLocalStore::new();
        store.set(ACCESS_TOKEN_KEY, "abc").expect("set should succeed");
        assert_eq!(
            store.get(ACCESS_TOKEN_KEY).expect("get should succeed"),
            Some("abc".to_owned())
        );
    }

    #[test]
    fn get_missing_key_is_none() {
        let store = MemoryLocalStore::new();
        assert_eq!(store.get("absent").expect("get should succeed"), None);
    }

    #[test]
    fn set_replaces_previous_value() {
        let store = MemoryLocalStore::new();
        store.set(REFRESH_TOKEN_KEY, "first").expect("set should succeed");
        store.set(REFRESH_TOKEN_KEY, "second").expect("set should succeed");
        assert_eq!(
            store.get(REFRESH_TOKEN_KEY).expect("get should succeed"),
            Some("second".to_owned())
        );
    }

    #[test]
    fn remove_is_idempotent() {
        let store = MemoryLocalStore::new();
        store.set(UNLOCK_MARKER_KEY, "x").expect("set should succeed");
        store.remove(UNLOCK_MARKER_KEY).expect("remove should succeed");
        store.remove(UNLOCK_MARKER_KEY).expect("second remove should succeed");
        assert_eq!(store.get(UNLOCK_MARKER_KEY).expect("get should succeed"), None);
    }
}
