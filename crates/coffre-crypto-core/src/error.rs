//! Cryptographic error types for `coffre-crypto-core`.

use thiserror::Error;

/// Errors produced by cryptographic operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Key derivation failed (Argon2id parameter validation, memory allocation).
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    /// Derivation settings named an algorithm this build does not implement.
    #[error("unsupported derivation algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Derivation settings payload was malformed or out of range.
    #[error("invalid derivation settings: {0}")]
    InvalidSettings(String),

    /// Symmetric encryption failure (AES-256-GCM).
    #[error("encryption error: {0}")]
    Encryption(String),

    /// Authentication tag verification failed — ciphertext tampered or wrong key.
    #[error("decryption failed: authentication tag mismatch")]
    Authentication,

    /// Invalid key material (wrong length, corrupted bytes).
    #[error("invalid key material: {0}")]
    InvalidKeyMaterial(String),

    /// Secure memory allocation failure (mlock, guard pages).
    #[error("secure memory error: {0}")]
    SecureMemory(String),

    /// Vault blob parsing or serialization error.
    #[error("vault format error: {0}")]
    VaultFormat(String),
}
