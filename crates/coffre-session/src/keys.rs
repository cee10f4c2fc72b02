//! Ephemeral session keys.
//!
//! A session key re-wraps the decrypted vault for session-scoped storage so
//! the password-derived vault key never has to leave process memory. Session
//! keys are 256-bit random values with no relationship to the master
//! password; every store operation mints a fresh one, which is what makes
//! rotation an invalidation: blobs wrapped under a previous key simply stop
//! authenticating.

use crate::error::SessionError;
use coffre_crypto_core::aead::{self, SealDomain, SealedBlob};
use coffre_crypto_core::memory::{SecretBuffer, SecretBytes};
use std::fmt;

/// Session key length in bytes (256 bits).
pub const SESSION_KEY_LEN: usize = 32;

/// A single ephemeral session key. Zeroized on drop.
pub struct SessionKey {
    key: SecretBytes<SESSION_KEY_LEN>,
}

impl SessionKey {
    /// Mint a fresh random session key.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Crypto` if the CSPRNG fails.
    pub fn generate() -> Result<Self, SessionError> {
        Ok(Self {
            key: SecretBytes::random()?,
        })
    }

    /// Wrap plaintext vault bytes for session-scoped storage.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Crypto` if sealing fails.
    pub fn wrap(&self, plaintext: &[u8]) -> Result<SealedBlob, SessionError> {
        Ok(aead::seal(
            self.key.expose(),
            SealDomain::Session,
            plaintext,
        )?)
    }

    /// Unwrap a session blob.
    ///
    /// A blob wrapped under a different (e.g. rotated-away) key fails the
    /// tag check and yields `CryptoError::Authentication`; there is no
    /// silent success path with stale keys.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Crypto` if authentication or decryption fails.
    pub fn unwrap(&self, blob: &SealedBlob) -> Result<SecretBuffer, SessionError> {
        Ok(aead::open(self.key.expose(), SealDomain::Session, blob)?)
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionKey(***)")
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
