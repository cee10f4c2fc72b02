//! Local unlock test marker.
//!
//! A small fixed plaintext sealed under the vault key and kept in local
//! storage. Re-deriving a candidate key and checking it against the marker
//! answers "is this still the right key?" without a server round trip and
//! without decrypting the full vault.
//!
//! [`verify_marker`] deliberately never returns an error: an invalid key, a
//! tampered blob, and a truncated blob all collapse to `false`. The marker
//! is a convenience signal only — real vault decryption authenticates
//! independently through its own tag, so a forged `true` here unlocks
//! nothing.

use crate::aead::{self, SealDomain, SealedBlob};
use crate::error::CryptoError;

/// The fixed marker plaintext.
const MARKER_PLAINTEXT: &[u8] = b"coffre-test-string";

/// Seal the marker plaintext under `key`.
///
/// Call after every successful unlock or key change so the persisted copy
/// always matches the current vault key.
///
/// # Errors
///
/// Returns `CryptoError::Encryption` if the key is not 32 bytes or sealing
/// fails.
pub fn seal_marker(key: &[u8]) -> Result<SealedBlob, CryptoError> {
    aead::seal(key, SealDomain::UnlockMarker, MARKER_PLAINTEXT)
}

/// Check whether `key` opens the persisted marker.
///
/// Returns `true` only if the blob authenticates under `key` in the marker
/// domain and the plaintext matches. Every failure mode returns `false`;
/// this function has no error path.
#[must_use]
pub fn verify_marker(key: &[u8], blob: &SealedBlob) -> bool {
    match aead::open(key, SealDomain::UnlockMarker, blob) {
        Ok(plaintext) => {
            ring::constant_time::verify_slices_are_equal(plaintext.expose(), MARKER_PLAINTEXT)
                .is_ok()
        }
        Err(_) => false,
    }
}

/// [`verify_marker`] for a raw serialized blob, folding parse failures into
/// `false` as well.
#[must_use]
pub fn verify_marker_bytes(key: &[u8], bytes: &[u8]) -> bool {
    match SealedBlob::from_bytes(bytes) {
        Ok(blob) => verify_marker(key, &blob),
        Err(_) => false,
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
