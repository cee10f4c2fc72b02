//! Error types for authentication and token lifecycle.

use coffre_crypto_core::error::CryptoError;
use thiserror::Error;

/// Errors surfaced by the login protocol, token lifecycle, and their
/// HTTP plumbing.
///
/// The two terminal variants force a full re-login: [`RefreshExhausted`]
/// (the refresh token itself was rejected) and [`MissingMarker`] (no
/// local unlock marker exists to check a password against).
///
/// [`RefreshExhausted`]: AuthError::RefreshExhausted
/// [`MissingMarker`]: AuthError::MissingMarker
#[derive(Debug, Error)]
pub enum AuthError {
    /// Derivation, sealing, or parsing failure in the crypto core.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// The client configuration cannot be used as given.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The request never completed: DNS, connect, TLS, or timeout.
    #[error("network failure: {0}")]
    Network(#[from] reqwest::Error),

    /// The server replied, but not with anything this protocol allows.
    #[error("protocol failure: {0}")]
    Protocol(String),

    /// The server (or our check of its counter-proof) refused the login.
    #[error("login rejected: {0}")]
    ProtocolRejected(String),

    /// The refresh token was rejected; only a full login can recover.
    #[error("refresh token rejected: full login required")]
    RefreshExhausted,

    /// No unlock marker is stored, so local password checks are
    /// impossible; only a full login can recover.
    #[error("no unlock marker stored: full login required")]
    MissingMarker,

    /// Host local storage failed to read or write.
    #[error("local storage failure: {0}")]
    Storage(String),
}
