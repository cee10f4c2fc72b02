//! Session-scoped blob storage.
//!
//! The wrapped vault blob lives in whatever session-lifetime storage the
//! host provides (browser session storage, an OS keychain item, a tmpfs
//! file). The trait sees only ciphertext: everything that reaches a
//! [`SessionStore`] has already been wrapped under the session key.

use crate::error::SessionError;
use std::sync::Mutex;

/// Host-provided storage for the session-wrapped vault blob.
///
/// Implementations hold a single slot. They are trusted for availability
/// only, never for confidentiality — the bytes are sealed.
pub trait SessionStore: Send + Sync {
    /// Replace the stored blob.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Store` if the backing storage fails.
    fn put(&self, bytes: &[u8]) -> Result<(), SessionError>;

    /// Fetch the stored blob, or `None` if nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Store` if the backing storage fails.
    fn get(&self) -> Result<Option<Vec<u8>>, SessionError>;

    /// Remove the stored blob. Removing an empty slot is not an error.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Store` if the backing storage fails.
    fn remove(&self) -> Result<(), SessionError>;
}

/// In-memory store — the default for tests and single-process hosts.
#[derive(Default)]
pub struct MemorySessionStore {
    slot: Mutex<Option<Vec<u8>>>,
}

impl MemorySessionStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn put(&self, bytes: &[u8]) -> Result<(), SessionError> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| SessionError::Store("session store mutex poisoned".into()))?;
        *slot = Some(bytes.to_vec());
        Ok(())
    }

    fn get(&self) -> Result<Option<Vec<u8>>, SessionError> {
        let slot = self
            .slot
            .lock()
            .map_err(|_| SessionError::Store("session store mutex poisoned".into()))?;
        Ok(slot.clone())
    }

    fn remove(&self) -> Result<(), SessionError> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| SessionError::Store("session store mutex poisoned".into()))?;
        *slot = None;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
