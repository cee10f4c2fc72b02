//! `coffre-crypto-core` — Pure cryptographic primitives for COFFRE.
//!
//! This crate is the audit target: zero network, zero async. Everything that
//! touches a password, a derived key, or vault plaintext lives here.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::arithmetic_side_effects))]

pub mod error;
pub mod memory;

pub mod kdf;

pub mod aead;

pub mod vault;

pub mod marker;

pub use aead::{open, seal, SealDomain, SealedBlob, KEY_LEN, NONCE_LEN, TAG_LEN};
pub use error::CryptoError;
pub use kdf::{
    derive, generate_salt, KdfAlgorithm, KdfParams, KdfSettings, DEFAULT_ITERATIONS,
    DEFAULT_MEMORY_KIB, DEFAULT_PARALLELISM, SALT_LEN,
};
pub use marker::{seal_marker, verify_marker, verify_marker_bytes};
pub use memory::{disable_core_dumps, MemLock, SecretBuffer, SecretBytes};
pub use vault::{
    decrypt_vault, encrypt_vault, unlock, EncryptedVaultBlob, UnlockedVault, VaultHeader,
    FORMAT_VERSION, MAGIC,
};
