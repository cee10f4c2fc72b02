//! Encrypted vault blob — self-describing at-rest container.
//!
//! This module provides:
//! - [`encrypt_vault`] — seal a plaintext vault payload under a derived key
//! - [`decrypt_vault`] — authenticate and open a blob with an already-derived key
//! - [`unlock`] — derive the key from a master password using the blob's own
//!   parameters, then decrypt
//! - [`EncryptedVaultBlob`] — header + sealed payload, serializable
//!
//! # Blob Layout
//!
//! ```text
//! Magic (4 B) | Header Len (u32 LE) | Header JSON | Body Len (u32 LE) | Sealed bytes
//! ```
//!
//! The unencrypted header carries the KDF parameters and salt that produced
//! the blob's key, so unlocking never depends on out-of-band configuration:
//! strengthened defaults only apply at the next re-encrypt. Saves supersede
//! rather than mutate — every re-encrypt gets a new revision and a fresh
//! nonce. No user data lives in the header.

use crate::aead::{self, SealDomain, SealedBlob};
use crate::error::CryptoError;
use crate::kdf::{self, KdfParams};
use crate::memory::SecretBuffer;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Magic bytes identifying a serialized vault blob.
pub const MAGIC: &[u8; 4] = b"CFRE";

/// Current blob format version.
pub const FORMAT_VERSION: u8 = 1;

/// Length of the magic bytes.
const MAGIC_LEN: usize = 4;

/// Length of a u32 length prefix.
const LEN_PREFIX: usize = 4;

/// Minimum serialized size: magic + two length prefixes.
const MIN_BLOB_SIZE: usize = MAGIC_LEN + LEN_PREFIX + LEN_PREFIX;

/// Hex characters of the blake3 digest exposed as the blob identifier.
const BLOB_ID_LEN: usize = 16;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Unencrypted blob metadata.
///
/// Contains ONLY what decryption needs: format version, derivation
/// parameters, salt, and the revision counter. Never account names,
/// entry counts, or timestamps.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultHeader {
    /// Blob format version (currently 1).
    pub version: u8,
    /// Parameters that derived this blob's key.
    pub kdf: KdfParams,
    /// Per-account KDF salt.
    pub salt: Vec<u8>,
    /// Monotonic save counter. A re-encrypt produces `revision + 1` and the
    /// old blob is superseded, never rewritten in place.
    pub revision: u64,
}

/// A complete at-rest vault: header plus sealed payload.
#[must_use = "encrypted vault blobs must be stored or transmitted"]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncryptedVaultBlob {
    /// Unencrypted metadata.
    pub header: VaultHeader,
    /// AES-256-GCM sealed payload, bound to the vault domain.
    pub sealed: SealedBlob,
}

/// Result of [`unlock`]: the derived key and the decrypted payload.
///
/// The key is returned alongside the payload so callers can reuse it for
/// marker generation and re-encryption without deriving twice.
pub struct UnlockedVault {
    /// The Argon2id-derived vault key.
    pub vault_key: SecretBuffer,
    /// The decrypted vault payload.
    pub payload: SecretBuffer,
}

impl EncryptedVaultBlob {
    /// Opaque identifier for this blob — a truncated blake3 digest of the
    /// sealed body. Safe to log and compare; reveals nothing about content.
    #[must_use]
    pub fn blob_id(&self) -> String {
        let digest = blake3::hash(&self.sealed.body);
        let hex = digest.to_hex();
        hex.as_str().chars().take(BLOB_ID_LEN).collect()
    }

    /// Serialize to the binary blob layout.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::VaultFormat` if the header cannot be encoded or
    /// a section exceeds the u32 length prefix.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CryptoError> {
        let header_json = serde_json::to_vec(&self.header)
            .map_err(|e| CryptoError::VaultFormat(format!("header serialization failed: {e}")))?;
        let header_len: u32 = u32::try_from(header_json.len())
            .map_err(|_| CryptoError::VaultFormat("header too large for u32 length".into()))?;

        let body = self.sealed.to_bytes();
        let body_len: u32 = u32::try_from(body.len())
            .map_err(|_| CryptoError::VaultFormat("sealed body too large for u32 length".into()))?;

        let total = MAGIC_LEN
            .checked_add(LEN_PREFIX)
            .and_then(|s| s.checked_add(header_json.len()))
            .and_then(|s| s.checked_add(LEN_PREFIX))
            .and_then(|s| s.checked_add(body.len()))
            .ok_or_else(|| CryptoError::VaultFormat("blob size overflow".into()))?;

        let mut out = Vec::with_capacity(total);
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&header_len.to_le_bytes());
        out.extend_from_slice(&header_json);
        out.extend_from_slice(&body_len.to_le_bytes());
        out.extend_from_slice(&body);
        Ok(out)
    }

    /// Parse a serialized blob without decrypting anything.
    ///
    /// Validates the magic, version, header structure, and KDF parameter
    /// ranges, so a hostile blob fails here instead of driving the KDF with
    /// absurd costs.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::VaultFormat` for structural problems and
    /// `CryptoError::InvalidSettings` for out-of-range KDF parameters.
    pub fn from_bytes(data: &[u8]) -> Result<Self, CryptoError> {
        if data.len() < MIN_BLOB_SIZE {
            return Err(CryptoError::VaultFormat(format!(
                "blob too short: {} bytes (minimum {MIN_BLOB_SIZE})",
                data.len()
            )));
        }
        if &data[..MAGIC_LEN] != MAGIC.as_slice() {
            return Err(CryptoError::VaultFormat("invalid magic bytes".into()));
        }

        let mut cursor = MAGIC_LEN;

        let header_len = read_u32_le(data, &mut cursor)?;
        let header_end = cursor
            .checked_add(header_len)
            .ok_or_else(|| CryptoError::VaultFormat("header length overflow".into()))?;
        if header_end > data.len() {
            return Err(CryptoError::VaultFormat(format!(
                "header extends beyond blob: header_end={header_end}, blob_len={}",
                data.len()
            )));
        }
        let header: VaultHeader = serde_json::from_slice(&data[cursor..header_end])
            .map_err(|e| CryptoError::VaultFormat(format!("invalid header: {e}")))?;
        cursor = header_end;

        if header.version > FORMAT_VERSION {
            return Err(CryptoError::VaultFormat(format!(
                "blob format version {} is newer than supported version {FORMAT_VERSION}",
                header.version
            )));
        }
        header.kdf.validate()?;

        let body_len = read_u32_le(data, &mut cursor)?;
        let body_end = cursor
            .checked_add(body_len)
            .ok_or_else(|| CryptoError::VaultFormat("body length overflow".into()))?;
        if body_end != data.len() {
            return Err(CryptoError::VaultFormat(format!(
                "body length mismatch: declared end {body_end}, blob has {} bytes",
                data.len()
            )));
        }
        let sealed = SealedBlob::from_bytes(&data[cursor..body_end])?;

        Ok(Self { header, sealed })
    }
}

// ---------------------------------------------------------------------------
// Encrypt / decrypt
// ---------------------------------------------------------------------------

/// Seal a plaintext vault payload under an already-derived key.
///
/// The caller supplies the parameters and salt the key came from; they are
/// recorded in the header so the blob stays self-describing.
///
/// # Arguments
///
/// - `key` — exactly 32 bytes, the Argon2id-derived vault key
/// - `params` — the derivation parameters that produced `key`
/// - `salt` — the salt that produced `key`
/// - `revision` — save counter for the new blob
/// - `payload` — raw vault bytes (may be empty)
///
/// # Errors
///
/// Returns `CryptoError::InvalidSettings` if `params` fail validation and
/// `CryptoError::Encryption` if sealing fails.
pub fn encrypt_vault(
    key: &[u8],
    params: &KdfParams,
    salt: &[u8],
    revision: u64,
    payload: &[u8],
) -> Result<EncryptedVaultBlob, CryptoError> {
    params.validate()?;
    let sealed = aead::seal(key, SealDomain::Vault, payload)?;
    Ok(EncryptedVaultBlob {
        header: VaultHeader {
            version: FORMAT_VERSION,
            kdf: params.clone(),
            salt: salt.to_vec(),
            revision,
        },
        sealed,
    })
}

/// Authenticate and decrypt a vault blob with an already-derived key.
///
/// # Errors
///
/// Returns `CryptoError::Authentication` if the key is wrong or the blob
/// was tampered with. No partial plaintext is ever produced.
pub fn decrypt_vault(key: &[u8], blob: &EncryptedVaultBlob) -> Result<SecretBuffer, CryptoError> {
    aead::open(key, SealDomain::Vault, &blob.sealed)
}

/// Derive the key from `password` using the blob's own parameters and salt,
/// then decrypt.
///
/// This is the unlock path: the blob dictates its derivation inputs, so a
/// vault written under older defaults still opens.
///
/// # Errors
///
/// Returns `CryptoError::KeyDerivation` if derivation fails and
/// `CryptoError::Authentication` if the password is wrong or the blob was
/// tampered with.
pub fn unlock(password: &[u8], blob: &EncryptedVaultBlob) -> Result<UnlockedVault, CryptoError> {
    let vault_key = kdf::derive(password, &blob.header.salt, &blob.header.kdf)?;
    let payload = decrypt_vault(vault_key.expose(), blob)?;
    Ok(UnlockedVault { vault_key, payload })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Read a u32 from `data` at `cursor` in little-endian order, advancing `cursor`.
fn read_u32_le(data: &[u8], cursor: &mut usize) -> Result<usize, CryptoError> {
    let end = cursor
        .checked_add(LEN_PREFIX)
        .ok_or_else(|| CryptoError::VaultFormat("cursor overflow".into()))?;
    if end > data.len() {
        return Err(CryptoError::VaultFormat(format!(
            "blob too short to read u32 at offset {cursor}"
        )));
    }
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&data[*cursor..end]);
    *cursor = end;
    let value = u32::from_le_bytes(buf);
    usize::try_from(value)
        .map_err(|_| CryptoError::VaultFormat("u32 value exceeds platform usize".into()))
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
