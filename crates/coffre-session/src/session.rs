//! Process-scoped vault session state.
//!
//! All session state hangs off an explicit [`VaultSession`] value instead of
//! module globals, so tests and multi-account hosts can hold several
//! independent sessions. The session owns:
//!
//! - the password-derived vault key (`None` while locked)
//! - the current ephemeral session key (`None` while locked)
//! - a handle to the host's [`SessionStore`] holding the wrapped blob
//!
//! Dropping the keys (by setting the slots to `None`) zeroizes them via
//! their `Drop` impls. An epoch counter guards against the lost-race where
//! a slow derivation or login finishes after the user has logged out: such
//! results are discarded with [`SessionError::Superseded`] instead of
//! resurrecting the cleared session.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Once};

use coffre_crypto_core::aead::SealedBlob;
use coffre_crypto_core::memory::SecretBuffer;
use tokio::sync::Mutex;

use crate::error::SessionError;
use crate::keys::SessionKey;
use crate::store::SessionStore;

// ── Status ─────────────────────────────────────────────────────────

/// Whether a session key is installed.
///
/// Locked is a state, not an error: callers render an unlock prompt from
/// it, while operations that require the key report
/// [`SessionError::NoActiveSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VaultStatus {
    /// No session key — before unlock or after clear.
    Locked,
    /// A session key is installed and the wrapped vault is readable.
    Unlocked,
}

/// Outcome of a non-erroring vault read probe.
///
/// [`VaultSession::try_retrieve_vault`] reports why nothing was returned so
/// the credential lookup can distinguish "locked" from "unlocked but
/// nothing stored" without treating either as a failure.
pub enum VaultReadState {
    /// No session key installed.
    Locked,
    /// Session key present but the store holds no blob.
    Empty,
    /// The decrypted vault payload.
    Ready(SecretBuffer),
}

// ── Session ────────────────────────────────────────────────────────

struct SessionInner {
    vault_key: Option<SecretBuffer>,
    session_key: Option<SessionKey>,
}

/// The explicit session context.
///
/// Interior mutability behind a `tokio::sync::Mutex`: every mutation —
/// store, unlock commit, clear — runs to completion under the lock, so a
/// concurrent reader observes the previous complete state or the new one,
/// never a half-applied rotation.
pub struct VaultSession {
    inner: Mutex<SessionInner>,
    epoch: AtomicU64,
    store: Arc<dyn SessionStore>,
}

impl VaultSession {
    /// A locked session backed by the given store.
    ///
    /// The first session constructed in a process also disables core dumps;
    /// failure to do so is logged and otherwise ignored.
    #[must_use]
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        static CORE_DUMPS: Once = Once::new();
        CORE_DUMPS.call_once(|| {
            if let Err(e) = coffre_crypto_core::disable_core_dumps() {
                tracing::warn!("failed to disable core dumps: {e}");
            }
        });

        Self {
            inner: Mutex::new(SessionInner {
                vault_key: None,
                session_key: None,
            }),
            epoch: AtomicU64::new(0),
            store,
        }
    }

    /// Current epoch. Capture before starting slow work, hand back to
    /// [`commit_unlock`](Self::commit_unlock) when done.
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Whether a session key is installed.
    pub async fn status(&self) -> VaultStatus {
        if self.inner.lock().await.session_key.is_some() {
            VaultStatus::Unlocked
        } else {
            VaultStatus::Locked
        }
    }

    /// Install the derived vault key and store the decrypted vault, as one
    /// atomic step at the end of a successful unlock or login.
    ///
    /// `expected_epoch` must be the value of [`epoch`](Self::epoch) captured
    /// before derivation started. If the session was cleared in the
    /// meantime the commit is refused and nothing is installed.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Superseded` on an epoch mismatch,
    /// `SessionError::Crypto` if wrapping fails, and `SessionError::Store`
    /// if persisting fails. On any error the session stays locked.
    pub async fn commit_unlock(
        &self,
        expected_epoch: u64,
        vault_key: SecretBuffer,
        plaintext_vault: &[u8],
    ) -> Result<(), SessionError> {
        let mut inner = self.inner.lock().await;
        if self.epoch.load(Ordering::SeqCst) != expected_epoch {
            tracing::debug!("discarding unlock result: session epoch advanced");
            return Err(SessionError::Superseded);
        }

        let session_key = Self::persist_wrapped(&*self.store, plaintext_vault)?;
        inner.vault_key = Some(vault_key);
        inner.session_key = Some(session_key);
        tracing::debug!(bytes = plaintext_vault.len(), "session unlocked");
        Ok(())
    }

    /// Store (or re-store) the decrypted vault, rotating the session key.
    ///
    /// Every call mints a fresh session key; blobs wrapped under the
    /// previous key stop authenticating the moment the rotation lands.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Crypto` if wrapping fails and
    /// `SessionError::Store` if persisting fails; the previous key and blob
    /// stay in place on failure.
    pub async fn store_vault(&self, plaintext_vault: &[u8]) -> Result<(), SessionError> {
        let mut inner = self.inner.lock().await;
        let session_key = Self::persist_wrapped(&*self.store, plaintext_vault)?;
        inner.session_key = Some(session_key);
        tracing::debug!(bytes = plaintext_vault.len(), "vault stored, session key rotated");
        Ok(())
    }

    /// Unwrap and return the stored vault.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NoActiveSession` when locked or nothing is
    /// stored, and `SessionError::Crypto` if the blob fails to
    /// authenticate.
    pub async fn retrieve_vault(&self) -> Result<SecretBuffer, SessionError> {
        match self.try_retrieve_vault().await? {
            VaultReadState::Ready(payload) => Ok(payload),
            VaultReadState::Locked | VaultReadState::Empty => Err(SessionError::NoActiveSession),
        }
    }

    /// Like [`retrieve_vault`](Self::retrieve_vault), but reports locked
    /// and empty as states instead of errors.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Store` if the store fails and
    /// `SessionError::Crypto` if a present blob fails to authenticate.
    pub async fn try_retrieve_vault(&self) -> Result<VaultReadState, SessionError> {
        let inner = self.inner.lock().await;
        let Some(session_key) = inner.session_key.as_ref() else {
            return Ok(VaultReadState::Locked);
        };
        let Some(bytes) = self.store.get()? else {
            return Ok(VaultReadState::Empty);
        };
        let blob = SealedBlob::from_bytes(&bytes)?;
        Ok(VaultReadState::Ready(session_key.unwrap(&blob)?))
    }

    /// Run `f` with the vault key exposed.
    ///
    /// Scopes the exposure to the closure so the raw bytes never escape
    /// into caller-owned storage.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NoActiveSession` if no vault key is
    /// installed.
    pub async fn with_vault_key<R>(
        &self,
        f: impl FnOnce(&[u8]) -> R,
    ) -> Result<R, SessionError> {
        let inner = self.inner.lock().await;
        let key = inner.vault_key.as_ref().ok_or(SessionError::NoActiveSession)?;
        Ok(f(key.expose()))
    }

    /// Tear the session down: drop both keys (zeroizing them), advance the
    /// epoch, and remove the stored blob.
    ///
    /// Idempotent and infallible — clearing an already-locked session is a
    /// no-op, and a store failure is logged rather than surfaced so logout
    /// always completes.
    pub async fn clear(&self) {
        let mut inner = self.inner.lock().await;
        inner.vault_key = None;
        inner.session_key = None;
        self.epoch.fetch_add(1, Ordering::SeqCst);
        if let Err(e) = self.store.remove() {
            tracing::warn!("failed to remove session blob during clear: {e}");
        }
        tracing::debug!("session cleared");
    }

    /// Wrap under a fresh key and persist; returns the new key only once
    /// the blob is safely stored.
    fn persist_wrapped(
        store: &dyn SessionStore,
        plaintext_vault: &[u8],
    ) -> Result<SessionKey, SessionError> {
        let session_key = SessionKey::generate()?;
        let blob = session_key.wrap(plaintext_vault)?;
        store.put(&blob.to_bytes())?;
        Ok(session_key)
    }
}

// ── Unit tests ─────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemorySessionStore;

    fn session() -> VaultSession {
        VaultSession::new(Arc::new(MemorySessionStore::new()))
    }

    fn key_material() -> SecretBuffer {
        SecretBuffer::copy_from(&[0xAA; 32])
    }

    #[tokio::test]
    async fn new_session_is_locked() {
        let s = session();
        assert_eq!(s.status().await, VaultStatus::Locked);
        assert!(matches!(
            s.retrieve_vault().await,
            Err(SessionError::NoActiveSession)
        ));
    }

    #[tokio::test]
    async fn store_then_retrieve_roundtrip() {
        let s = session();
        s.store_vault(b"vault payload").await.expect("store should succeed");
        assert_eq!(s.status().await, VaultStatus::Unlocked);
        let payload = s.retrieve_vault().await.expect("retrieve should succeed");
        assert_eq!(payload.expose(), b"vault payload");
    }

    #[tokio::test]
    async fn second_store_supersedes_first() {
        let s = session();
        s.store_vault(b"first").await.expect("store should succeed");
        s.store_vault(b"second").await.expect("store should succeed");
        let payload = s.retrieve_vault().await.expect("retrieve should succeed");
        assert_eq!(payload.expose(), b"second");
    }

    #[tokio::test]
    async fn rotation_invalidates_previous_blob() {
        let store = Arc::new(MemorySessionStore::new());
        let s = VaultSession::new(Arc::clone(&store) as Arc<dyn SessionStore>);

        s.store_vault(b"first").await.expect("store should succeed");
        let old_bytes = store
            .get()
            .expect("get should succeed")
            .expect("blob should be present");

        s.store_vault(b"second").await.expect("store should succeed");

        // The pre-rotation blob no longer authenticates under the live key.
        let old_blob = SealedBlob::from_bytes(&old_bytes).expect("blob should parse");
        let inner = s.inner.lock().await;
        let live_key = inner.session_key.as_ref().expect("session key present");
        assert!(live_key.unwrap(&old_blob).is_err());
    }

    #[tokio::test]
    async fn commit_unlock_installs_key_and_vault() {
        let s = session();
        let epoch = s.epoch();
        s.commit_unlock(epoch, key_material(), b"unlocked vault")
            .await
            .expect("commit should succeed");

        assert_eq!(s.status().await, VaultStatus::Unlocked);
        let payload = s.retrieve_vault().await.expect("retrieve should succeed");
        assert_eq!(payload.expose(), b"unlocked vault");
        let seen = s
            .with_vault_key(|k| k.to_vec())
            .await
            .expect("vault key should be installed");
        assert_eq!(seen, vec![0xAA; 32]);
    }

    #[tokio::test]
    async fn stale_commit_is_discarded() {
        let s = session();
        let epoch = s.epoch();
        s.clear().await; // user logs out while derivation is in flight

        let result = s.commit_unlock(epoch, key_material(), b"late result").await;
        assert!(matches!(result, Err(SessionError::Superseded)));
        assert_eq!(s.status().await, VaultStatus::Locked);
        assert!(matches!(
            s.retrieve_vault().await,
            Err(SessionError::NoActiveSession)
        ));
    }

    #[tokio::test]
    async fn clear_is_idempotent() {
        let s = session();
        s.store_vault(b"payload").await.expect("store should succeed");
        s.clear().await;
        s.clear().await; // second clear on an already-locked session
        assert_eq!(s.status().await, VaultStatus::Locked);
        assert!(matches!(
            s.retrieve_vault().await,
            Err(SessionError::NoActiveSession)
        ));
    }

    #[tokio::test]
    async fn clear_advances_epoch() {
        let s = session();
        let before = s.epoch();
        s.clear().await;
        assert_eq!(s.epoch(), before + 1);
    }

    #[tokio::test]
    async fn with_vault_key_requires_commit() {
        let s = session();
        // store_vault alone installs a session key but no vault key.
        s.store_vault(b"payload").await.expect("store should succeed");
        assert!(matches!(
            s.with_vault_key(|_| ()).await,
            Err(SessionError::NoActiveSession)
        ));
    }

    #[tokio::test]
    async fn read_probe_distinguishes_locked_and_empty() {
        let store = Arc::new(MemorySessionStore::new());
        let s = VaultSession::new(Arc::clone(&store) as Arc<dyn SessionStore>);

        assert!(matches!(
            s.try_retrieve_vault().await.expect("probe should succeed"),
            VaultReadState::Locked
        ));

        s.store_vault(b"payload").await.expect("store should succeed");
        assert!(matches!(
            s.try_retrieve_vault().await.expect("probe should succeed"),
            VaultReadState::Ready(_)
        ));

        // Host wiped session storage out from under us.
        store.remove().expect("remove should succeed");
        assert!(matches!(
            s.try_retrieve_vault().await.expect("probe should succeed"),
            VaultReadState::Empty
        ));
    }
}
