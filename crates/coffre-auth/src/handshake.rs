//! SRP-6a client handshake over the RustCrypto `srp` crate.
//!
//! 2048-bit group, SHA-256. All wire values are lowercase hex; server
//! values decode case-insensitively. The "password" fed into the
//! exchange is the hex-encoded Argon2id vault key, so the raw master
//! password never participates and the server never holds anything it
//! could replay as a credential.

use coffre_crypto_core::memory::SecretBuffer;
use data_encoding::{HEXLOWER, HEXLOWER_PERMISSIVE};
use sha2::Sha256;
use srp::client::{SrpClient, SrpClientVerifier};
use srp::groups::G_2048;

use crate::error::AuthError;

/// Length of the client's random ephemeral secret.
const EPHEMERAL_SECRET_LEN: usize = 64;

/// Client-side material for one proof exchange.
///
/// Created by [`begin`] after the server's challenge arrives; consumed
/// when the server's counter-proof is checked.
pub(crate) struct Handshake {
    /// Hex `A`, sent with the proof.
    pub(crate) client_public_ephemeral: String,
    /// Hex `M1`, the client's session proof.
    pub(crate) client_session_proof: String,
    verifier: SrpClientVerifier<Sha256>,
}

impl Handshake {
    /// Check the server's counter-proof (`M2`).
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Protocol` if the value is not hex and
    /// `AuthError::ProtocolRejected` if the proof does not match —
    /// either the server does not hold the verifier it claimed, or the
    /// exchange was tampered with.
    pub(crate) fn verify_server_proof(&self, server_proof_hex: &str) -> Result<(), AuthError> {
        let proof = decode_hex("server session proof", server_proof_hex)?;
        self.verifier
            .verify_server(&proof)
            .map_err(|_| AuthError::ProtocolRejected("server session proof mismatch".into()))
    }
}

/// Run the client side of the handshake up to the proof.
///
/// # Errors
///
/// Returns `AuthError::Protocol` if the server ephemeral is not hex or
/// is cryptographically illegal (for example, zero modulo the group
/// prime), and `AuthError::Crypto` if the system RNG fails.
pub(crate) fn begin(
    identity: &str,
    password: &[u8],
    salt: &[u8],
    server_ephemeral_hex: &str,
) -> Result<Handshake, AuthError> {
    let server_ephemeral = decode_hex("server ephemeral", server_ephemeral_hex)?;
    let secret = SecretBuffer::random(EPHEMERAL_SECRET_LEN)?;

    let client = SrpClient::<Sha256>::new(&G_2048);
    let public_ephemeral = client.compute_public_ephemeral(secret.expose());
    let verifier = client
        .process_reply(
            secret.expose(),
            identity.as_bytes(),
            password,
            salt,
            &server_ephemeral,
        )
        .map_err(|e| AuthError::Protocol(format!("server ephemeral rejected: {e}")))?;

    Ok(Handshake {
        client_public_ephemeral: HEXLOWER.encode(&public_ephemeral),
        client_session_proof: HEXLOWER.encode(verifier.proof()),
        verifier,
    })
}

/// SRP verifier for enrollment; the server stores only this and the
/// salt, neither of which proves knowledge of the password.
#[must_use]
pub(crate) fn compute_verifier(identity: &str, password: &[u8], salt: &[u8]) -> Vec<u8> {
    SrpClient::<Sha256>::new(&G_2048).compute_verifier(identity.as_bytes(), password, salt)
}

fn decode_hex(what: &str, value: &str) -> Result<Vec<u8>, AuthError> {
    HEXLOWER_PERMISSIVE
        .decode(value.as_bytes())
        .map_err(|e| AuthError::Protocol(format!("{what} is not valid hex: {e}")))
}

// ── Unit tests ─────────────────────────────────────────────────────
