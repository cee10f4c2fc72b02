//! Local unlock validation.
//!
//! After a full login, a small marker sealed under the vault key is kept
//! in local storage (base64, under `encryptionTestString`). Re-unlocking
//! later means deriving a candidate key from the entered password and
//! checking it against the marker, entirely offline.
//!
//! The check is a total function: every failure mode folds into a
//! [`MarkerCheck`] variant instead of an error, so callers can route on
//! the outcome without a panic path. A marker that is absent or
//! unreadable is [`MarkerCheck::Missing`], which callers must answer
//! with a full online login, never by accepting the key.

use coffre_crypto_core::aead::SealedBlob;
use coffre_crypto_core::error::CryptoError;
use coffre_crypto_core::marker;
use data_encoding::BASE64;
use tracing::debug;

use crate::error::AuthError;
use crate::storage::{LocalStore, UNLOCK_MARKER_KEY};

/// Outcome of testing a candidate vault key against the stored marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerCheck {
    /// The marker opened and matched: the key is the vault key.
    Valid,
    /// A well-formed marker is stored but did not open: wrong password.
    Mismatch,
    /// No usable marker is stored. Only a full login can mint one.
    Missing,
}

impl MarkerCheck {
    #[must_use]
    pub const fn is_valid(self) -> bool {
        matches!(self, Self::Valid)
    }

    /// Convert to a `Result` for callers that treat anything but a valid
    /// key as fatal.
    ///
    /// # Errors
    ///
    /// `Mismatch` becomes `AuthError::Crypto` (authentication failure)
    /// and `Missing` becomes `AuthError::MissingMarker`.
    pub const fn into_result(self) -> Result<(), AuthError> {
        match self {
            Self::Valid => Ok(()),
            Self::Mismatch => Err(AuthError::Crypto(CryptoError::Authentication)),
            Self::Missing => Err(AuthError::MissingMarker),
        }
    }
}

/// Seal a fresh marker under `key` and store it.
///
/// Called after every successful login, replacing any previous marker.
///
/// # Errors
///
/// Returns `AuthError::Crypto` if sealing fails and `AuthError::Storage`
/// if the store cannot be written.
pub fn store_unlock_marker(store: &dyn LocalStore, key: &[u8]) -> Result<(), AuthError> {
    let blob = marker::seal_marker(key)?;
    store.set(UNLOCK_MARKER_KEY, &BASE64.encode(&blob.to_bytes()))
}

/// Test a candidate vault key against the stored marker.
///
/// Never fails: storage errors, absent markers, and undecodable markers
/// all come back as [`MarkerCheck::Missing`]; a marker that parses but
/// does not open under `key` is [`MarkerCheck::Mismatch`].
#[must_use]
pub fn check_unlock_key(store: &dyn LocalStore, key: &[u8]) -> MarkerCheck {
    let stored = match store.get(UNLOCK_MARKER_KEY) {
        Ok(Some(value)) => value,
        Ok(None) => return MarkerCheck::Missing,
        Err(e) => {
            debug!(error = %e, "unlock marker unreadable");
            return MarkerCheck::Missing;
        }
    };
    let Ok(bytes) = BASE64.decode(stored.as_bytes()) else {
        return MarkerCheck::Missing;
    };
    let Ok(blob) = SealedBlob::from_bytes(&bytes) else {
        return MarkerCheck::Missing;
    };
    if marker::verify_marker(key, &blob) {
        MarkerCheck::Valid
    } else {
        MarkerCheck::Mismatch
    }
}

// ── Unit tests ─────────────────────────────────────────────────────
