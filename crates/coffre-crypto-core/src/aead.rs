//! AES-256-GCM authenticated encryption with domain separation.
//!
//! This module provides:
//! - [`seal`] — encrypt plaintext under a purpose-bound domain, returning [`SealedBlob`]
//! - [`open`] — authenticate and decrypt a [`SealedBlob`], returning [`SecretBuffer`]
//! - [`SealDomain`] — the fixed AAD tag each blob is bound to
//!
//! Nonces are generated internally from the CSPRNG on every call; no API in
//! this crate accepts a caller-supplied nonce, so reuse under a key cannot
//! be expressed. Decryption is all-or-nothing: a failed tag check yields
//! [`CryptoError::Authentication`] and no plaintext.

use crate::error::CryptoError;
use crate::memory::SecretBuffer;
use rand::rngs::OsRng;
use rand::RngCore;
use ring::aead;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

/// AES-256-GCM nonce length in bytes (96 bits).
pub const NONCE_LEN: usize = 12;

/// AES-256-GCM authentication tag length in bytes (128 bits).
pub const TAG_LEN: usize = 16;

/// AES-256-GCM key length in bytes (256 bits).
pub const KEY_LEN: usize = 32;

/// Minimum valid serialized length: nonce + tag around an empty ciphertext.
const MIN_BLOB_LEN: usize = NONCE_LEN + TAG_LEN;

// ---------------------------------------------------------------------------
// Domains
// ---------------------------------------------------------------------------

/// Purpose a blob was sealed for, mixed into the AAD.
///
/// A blob sealed for one domain will not open under another even with the
/// correct key, so an at-rest vault blob can never be replayed as a session
/// blob or an unlock marker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SealDomain {
    /// The at-rest vault payload, keyed by the derived vault key.
    Vault,
    /// Session-scoped storage, keyed by an ephemeral session key.
    Session,
    /// The local unlock test marker, keyed by the derived vault key.
    UnlockMarker,
}

impl SealDomain {
    /// The fixed additional-authenticated-data tag for this domain.
    #[must_use]
    pub const fn aad_tag(self) -> &'static [u8] {
        match self {
            Self::Vault => b"coffre-vault-v1",
            Self::Session => b"coffre-session-v1",
            Self::UnlockMarker => b"coffre-unlock-marker-v1",
        }
    }

    /// Human-readable name for error context.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Vault => "vault",
            Self::Session => "session",
            Self::UnlockMarker => "unlock-marker",
        }
    }
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Authenticated ciphertext container.
///
/// Wire format: `nonce (12 bytes) || ciphertext+tag (variable)`. The tag is
/// the trailing 16 bytes of `body`; keeping ciphertext and tag in one buffer
/// matches what `open_in_place` consumes, so deserialization never has to
/// re-stitch them.
#[must_use = "sealed data must be stored or transmitted"]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedBlob {
    /// 96-bit random nonce, unique per seal.
    pub nonce: [u8; NONCE_LEN],
    /// Ciphertext followed by the 128-bit authentication tag.
    pub body: Vec<u8>,
}

impl SealedBlob {
    /// Length of the ciphertext (without the trailing tag).
    #[must_use]
    pub fn ciphertext_len(&self) -> usize {
        self.body.len().saturating_sub(TAG_LEN)
    }

    /// Serialize to wire format: `nonce || body`.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(NONCE_LEN.saturating_add(self.body.len()));
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.body);
        out
    }

    /// Deserialize from wire format: `nonce || body`.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::Encryption` if the input is shorter than 28
    /// bytes (12-byte nonce + tag around an empty ciphertext).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() < MIN_BLOB_LEN {
            return Err(CryptoError::Encryption(format!(
                "sealed blob too short: {} bytes (minimum {MIN_BLOB_LEN})",
                bytes.len()
            )));
        }

        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&bytes[..NONCE_LEN]);
        let body = bytes[NONCE_LEN..].to_vec();

        Ok(Self { nonce, body })
    }
}

// ---------------------------------------------------------------------------
// Seal / open
// ---------------------------------------------------------------------------

/// Encrypt plaintext under `key` for the given domain.
///
/// The 96-bit nonce is drawn from `OsRng` inside this function and returned
/// as part of the blob.
///
/// # Arguments
///
/// - `key` — exactly 32 bytes (256-bit AES key)
/// - `domain` — purpose tag the blob is bound to
/// - `plaintext` — data to encrypt (may be empty)
///
/// # Errors
///
/// Returns `CryptoError::Encryption` if the key is not exactly 32 bytes or
/// the underlying operation fails.
pub fn seal(key: &[u8], domain: SealDomain, plaintext: &[u8]) -> Result<SealedBlob, CryptoError> {
    let less_safe_key = gcm_key(key)?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng
        .try_fill_bytes(&mut nonce_bytes)
        .map_err(|e| CryptoError::Encryption(format!("nonce generation failed: {e}")))?;
    let nonce = aead::Nonce::assume_unique_for_key(nonce_bytes);

    // Encrypt in place, then append the tag so `body` is ready for open_in_place.
    let mut body = plaintext.to_vec();
    let Ok(tag) =
        less_safe_key.seal_in_place_separate_tag(nonce, aead::Aad::from(domain.aad_tag()), &mut body)
    else {
        body.zeroize();
        return Err(CryptoError::Encryption(format!(
            "AES-256-GCM seal failed for {} domain",
            domain.as_str()
        )));
    };
    body.extend_from_slice(tag.as_ref());

    Ok(SealedBlob {
        nonce: nonce_bytes,
        body,
    })
}

/// Authenticate and decrypt a [`SealedBlob`].
///
/// The plaintext is returned as a [`SecretBuffer`] (zeroized on drop); the
/// intermediate buffer is zeroized after the copy.
///
/// # Arguments
///
/// - `key` — exactly 32 bytes, the key the blob was sealed under
/// - `domain` — must match the domain used at seal time
/// - `blob` — the sealed container
///
/// # Errors
///
/// Returns `CryptoError::Encryption` if the key length or blob shape is
/// invalid. Returns `CryptoError::Authentication` if the tag check fails —
/// tampered data, wrong key, or wrong domain.
pub fn open(key: &[u8], domain: SealDomain, blob: &SealedBlob) -> Result<SecretBuffer, CryptoError> {
    let less_safe_key = gcm_key(key)?;

    if blob.body.len() < TAG_LEN {
        return Err(CryptoError::Encryption(format!(
            "sealed body too short: {} bytes (minimum {TAG_LEN})",
            blob.body.len()
        )));
    }

    let nonce = aead::Nonce::assume_unique_for_key(blob.nonce);

    let mut scratch = blob.body.clone();
    let plaintext = less_safe_key
        .open_in_place(nonce, aead::Aad::from(domain.aad_tag()), &mut scratch)
        .map_err(|_| CryptoError::Authentication)?;

    let result = SecretBuffer::copy_from(plaintext);
    scratch.zeroize();
    Ok(result)
}

fn gcm_key(key: &[u8]) -> Result<aead::LessSafeKey, CryptoError> {
    if key.len() != KEY_LEN {
        return Err(CryptoError::Encryption(format!(
            "invalid key length: {} bytes (expected {KEY_LEN})",
            key.len()
        )));
    }
    let unbound = aead::UnboundKey::new(&aead::AES_256_GCM, key)
        .map_err(|_| CryptoError::Encryption("failed to create AES-256-GCM key".into()))?;
    Ok(aead::LessSafeKey::new(unbound))
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
