//! Error types for `coffre-session`.

use coffre_crypto_core::CryptoError;
use thiserror::Error;

/// Errors produced by session state and the vault service.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Underlying cryptographic failure (wrap, unwrap, key generation).
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// No session key is installed — the vault is locked or was cleared.
    #[error("no active session")]
    NoActiveSession,

    /// The session epoch advanced while the operation was in flight; the
    /// result was discarded instead of resurrecting a cleared session.
    #[error("session superseded: epoch advanced during operation")]
    Superseded,

    /// The host-provided session store failed.
    #[error("session store error: {0}")]
    Store(String),

    /// The decrypted vault payload could not be read as a credential index.
    #[error("credential index error: {0}")]
    CredentialIndex(String),

    /// The vault service task is gone (channel closed).
    #[error("vault service unavailable")]
    ServiceUnavailable,
}
