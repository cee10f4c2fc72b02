//! Zero-knowledge login protocol handler.
//!
//! Two round trips against the API, with an optional third for a second
//! factor:
//!
//! 1. `POST api/v1/Auth/login` with the username. The server answers
//!    with the account salt, its SRP ephemeral, and the derivation
//!    settings for this account.
//! 2. The client derives the vault key (Argon2id), uses its hex form as
//!    the SRP password, and `POST`s ephemeral + proof to
//!    `api/v1/Auth/validate`.
//! 3. If the account has a second factor, `api/v1/Auth/validate-2fa`
//!    with the code completes the exchange.
//!
//! The password and vault key never leave the process; the server sees
//! only SRP values. The flow is a small state machine, inspectable via
//! [`LoginFlow::state`]; any failure lands in [`LoginState::Rejected`]
//! with all intermediate key material dropped, so a failed login can
//! never leave a half-installed session.

use coffre_crypto_core::kdf::{self, KdfAlgorithm, KdfParams, KdfSettings};
use coffre_crypto_core::memory::SecretBuffer;
use data_encoding::HEXLOWER;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;
use zeroize::Zeroizing;

use crate::error::AuthError;
use crate::handshake::{self, Handshake};
use crate::http::ApiClient;
use crate::storage::{LocalStore, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};
use crate::tokens::TokenPair;
use crate::unlock;

pub const LOGIN_ENDPOINT: &str = "api/v1/Auth/login";
pub const VALIDATE_ENDPOINT: &str = "api/v1/Auth/validate";
pub const VALIDATE_2FA_ENDPOINT: &str = "api/v1/Auth/validate-2fa";

// ── Wire types ─────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InitiateLoginRequest<'a> {
    username: &'a str,
}

/// The server's answer to the initiate call.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginChallenge {
    /// Account salt; its UTF-8 bytes feed both Argon2id and SRP.
    salt: String,
    /// Server SRP ephemeral `B`, hex.
    server_ephemeral: String,
    /// Derivation algorithm identifier, e.g. `"Argon2Id"`.
    encryption_type: String,
    /// JSON settings payload for [`KdfSettings`].
    encryption_settings: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ValidateLoginRequest<'a> {
    username: &'a str,
    remember_me: bool,
    client_public_ephemeral: &'a str,
    client_session_proof: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ValidateLogin2FaRequest<'a> {
    username: &'a str,
    #[serde(rename = "code2Fa")]
    code: u32,
    remember_me: bool,
    client_public_ephemeral: &'a str,
    client_session_proof: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ValidateLoginResponse {
    #[serde(default)]
    requires_two_factor: bool,
    #[serde(default)]
    token: Option<TokenPair>,
    #[serde(default)]
    server_session_proof: Option<String>,
}

// ── States and outcomes ────────────────────────────────────────────

/// Where a [`LoginFlow`] currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginState {
    /// Nothing started yet.
    Idle,
    /// Initiate request sent; deriving and proving once it answers.
    AwaitingServerChallenge,
    /// Proof sent; waiting on the server's verdict.
    ProofSubmitted,
    /// Server wants a second factor code.
    AwaitingSecondFactor,
    /// Exchange complete; tokens issued and counter-proof verified.
    Authenticated,
    /// The exchange failed; start over with a fresh `begin`.
    Rejected,
}

/// What a successful `begin` produced.
pub enum LoginOutcome {
    /// Fully authenticated in two round trips.
    Authenticated(AuthenticatedLogin),
    /// The account has 2FA enabled; resume with
    /// [`LoginFlow::submit_second_factor`].
    SecondFactorRequired,
}

/// Everything a host needs after a successful login.
pub struct AuthenticatedLogin {
    /// The issued token pair.
    pub tokens: TokenPair,
    /// The Argon2id-derived vault key.
    pub vault_key: SecretBuffer,
    /// Parameters the key was derived with.
    pub kdf: KdfParams,
    /// Account salt bytes the key was derived with.
    pub salt: Vec<u8>,
}

impl AuthenticatedLogin {
    /// Persist the non-secret outcome: the token pair under its
    /// well-known keys, and a fresh unlock marker sealed under the vault
    /// key.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Storage` if the store cannot be written and
    /// `AuthError::Crypto` if sealing the marker fails.
    pub fn persist(&self, store: &dyn LocalStore) -> Result<(), AuthError> {
        store.set(ACCESS_TOKEN_KEY, &self.tokens.token)?;
        store.set(REFRESH_TOKEN_KEY, &self.tokens.refresh_token)?;
        unlock::store_unlock_marker(store, self.vault_key.expose())
    }
}

// ── Flow ───────────────────────────────────────────────────────────

/// One login attempt against the API.
///
/// Single-use: after [`LoginState::Authenticated`] or
/// [`LoginState::Rejected`], start a new flow for the next attempt.
pub struct LoginFlow {
    client: ApiClient,
    state: LoginState,
    pending: Option<PendingLogin>,
}

/// Material held across the second-factor pause.
struct PendingLogin {
    username: String,
    remember_me: bool,
    handshake: Handshake,
    vault_key: SecretBuffer,
    kdf: KdfParams,
    salt: Vec<u8>,
}

impl LoginFlow {
    #[must_use]
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            state: LoginState::Idle,
            pending: None,
        }
    }

    /// Current position in the state machine.
    #[must_use]
    pub fn state(&self) -> LoginState {
        self.state
    }

    /// Run the exchange up to either full authentication or the
    /// second-factor pause.
    ///
    /// # Errors
    ///
    /// `AuthError::Network` if a request never completes,
    /// `AuthError::Protocol` for malformed or illegal server responses,
    /// `AuthError::ProtocolRejected` if either side refuses the proof,
    /// and `AuthError::Crypto` for derivation failures. On any error the
    /// flow is [`LoginState::Rejected`] and holds no key material.
    pub async fn begin(
        &mut self,
        username: &str,
        password: &[u8],
        remember_me: bool,
    ) -> Result<LoginOutcome, AuthError> {
        self.pending = None;
        match self.run_begin(username, password, remember_me).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                self.state = LoginState::Rejected;
                self.pending = None;
                Err(e)
            }
        }
    }

    /// Complete a flow paused in [`LoginState::AwaitingSecondFactor`].
    ///
    /// # Errors
    ///
    /// `AuthError::Protocol` if no second factor is pending; otherwise
    /// as [`begin`](Self::begin). Any error lands the flow in
    /// [`LoginState::Rejected`].
    pub async fn submit_second_factor(
        &mut self,
        code: u32,
    ) -> Result<AuthenticatedLogin, AuthError> {
        let pending = self
            .pending
            .take()
            .ok_or_else(|| AuthError::Protocol("no second factor pending".into()))?;
        match self.run_second_factor(pending, code).await {
            Ok(login) => {
                self.state = LoginState::Authenticated;
                Ok(login)
            }
            Err(e) => {
                self.state = LoginState::Rejected;
                Err(e)
            }
        }
    }

    async fn run_begin(
        &mut self,
        username: &str,
        password: &[u8],
        remember_me: bool,
    ) -> Result<LoginOutcome, AuthError> {
        let identity = srp_identity(username);

        self.state = LoginState::AwaitingServerChallenge;
        debug!(user = %identity, "initiating login");
        let response = self
            .client
            .post_json(LOGIN_ENDPOINT, &InitiateLoginRequest { username: &identity })
            .await?;
        let challenge: LoginChallenge = read_json(response).await?;

        let algorithm = KdfAlgorithm::from_id(&challenge.encryption_type)?;
        let params = KdfSettings::from_json(&challenge.encryption_settings)?.into_params(algorithm)?;
        let salt = challenge.salt.into_bytes();
        let vault_key = kdf::derive(password, &salt, &params)?;

        // The SRP password is the hex vault key, never the raw password.
        let srp_password = Zeroizing::new(HEXLOWER.encode(vault_key.expose()));
        let handshake = handshake::begin(
            &identity,
            srp_password.as_bytes(),
            &salt,
            &challenge.server_ephemeral,
        )?;

        self.state = LoginState::ProofSubmitted;
        let request = ValidateLoginRequest {
            username: &identity,
            remember_me,
            client_public_ephemeral: &handshake.client_public_ephemeral,
            client_session_proof: &handshake.client_session_proof,
        };
        let response = self.client.post_json(VALIDATE_ENDPOINT, &request).await?;
        let validation: ValidateLoginResponse = read_json(response).await?;

        if validation.requires_two_factor {
            debug!("second factor required");
            self.pending = Some(PendingLogin {
                username: identity,
                remember_me,
                handshake,
                vault_key,
                kdf: params,
                salt,
            });
            self.state = LoginState::AwaitingSecondFactor;
            return Ok(LoginOutcome::SecondFactorRequired);
        }

        let login = complete(validation, handshake, vault_key, params, salt)?;
        self.state = LoginState::Authenticated;
        debug!("login authenticated");
        Ok(LoginOutcome::Authenticated(login))
    }

    async fn run_second_factor(
        &mut self,
        pending: PendingLogin,
        code: u32,
    ) -> Result<AuthenticatedLogin, AuthError> {
        let PendingLogin {
            username,
            remember_me,
            handshake,
            vault_key,
            kdf: params,
            salt,
        } = pending;

        let request = ValidateLogin2FaRequest {
            username: &username,
            code,
            remember_me,
            client_public_ephemeral: &handshake.client_public_ephemeral,
            client_session_proof: &handshake.client_session_proof,
        };
        let response = self.client.post_json(VALIDATE_2FA_ENDPOINT, &request).await?;
        let validation: ValidateLoginResponse = read_json(response).await?;

        if validation.requires_two_factor {
            return Err(AuthError::ProtocolRejected("second factor rejected".into()));
        }
        let login = complete(validation, handshake, vault_key, params, salt)?;
        debug!("login authenticated after second factor");
        Ok(login)
    }
}

/// Check the counter-proof and assemble the outcome.
fn complete(
    validation: ValidateLoginResponse,
    handshake: Handshake,
    vault_key: SecretBuffer,
    kdf: KdfParams,
    salt: Vec<u8>,
) -> Result<AuthenticatedLogin, AuthError> {
    let server_proof = validation.server_session_proof.ok_or_else(|| {
        AuthError::Protocol("validation response missing server session proof".into())
    })?;
    handshake.verify_server_proof(&server_proof)?;
    let tokens = validation
        .token
        .ok_or_else(|| AuthError::Protocol("validation response missing token pair".into()))?;
    Ok(AuthenticatedLogin {
        tokens,
        vault_key,
        kdf,
        salt,
    })
}

/// Canonical SRP identity for a username: trimmed and lowercased, so
/// `" Alice@Example.COM "` and `"alice@example.com"` are one account.
#[must_use]
pub fn srp_identity(username: &str) -> String {
    username.trim().to_lowercase()
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, AuthError> {
    let status = response.status();
    let body = response.text().await?;
    if status.is_success() {
        return serde_json::from_str(&body)
            .map_err(|e| AuthError::Protocol(format!("malformed response body: {e}")));
    }
    if matches!(status.as_u16(), 400 | 401 | 403) {
        return Err(AuthError::ProtocolRejected(format!(
            "server refused the request ({status})"
        )));
    }
    Err(AuthError::Protocol(format!(
        "server returned unexpected status {status}"
    )))
}

// ── Enrollment ─────────────────────────────────────────────────────

/// What account creation (or a password change) sends to the server:
/// the salt and verifier. The vault key stays local for encrypting the
/// initial vault.
pub struct Enrollment {
    /// Fresh account salt, hex; its UTF-8 bytes are the derivation salt.
    pub salt: String,
    /// SRP verifier, hex.
    pub verifier: String,
    /// The derived vault key, for sealing the first vault and marker.
    pub vault_key: SecretBuffer,
    /// Parameters the key was derived with.
    pub kdf: KdfParams,
}

/// Client-side enrollment computation.
///
/// # Errors
///
/// Returns `AuthError::Crypto` if `params` fail validation, the RNG
/// fails, or derivation fails.
pub fn enroll(username: &str, password: &[u8], params: &KdfParams) -> Result<Enrollment, AuthError> {
    params.validate()?;
    let identity = srp_identity(username);
    let salt = HEXLOWER.encode(&kdf::generate_salt()?);
    let vault_key = kdf::derive(password, salt.as_bytes(), params)?;

    let srp_password = Zeroizing::new(HEXLOWER.encode(vault_key.expose()));
    let verifier = handshake::compute_verifier(&identity, srp_password.as_bytes(), salt.as_bytes());

    Ok(Enrollment {
        salt,
        verifier: HEXLOWER.encode(&verifier),
        vault_key,
        kdf: params.clone(),
    })
}

// ── Unit tests ─────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiConfig;

    fn fast_params() -> KdfParams {
        KdfParams {
            algorithm: KdfAlgorithm::Argon2id,
            memory_kib: 32,
            iterations: 1,
            parallelism: 1,
            version: 1,
        }
    }

    #[test]
    fn identity_is_trimmed_and_lowercased() {
        assert_eq!(srp_identity("  Alice@Example.COM "), "alice@example.com");
        assert_eq!(srp_identity("bob"), "bob");
    }

    #[test]
    fn new_flow_starts_idle() {
        let client = ApiClient::new(&ApiConfig::default()).expect("client should build");
        let flow = LoginFlow::new(client);
        assert_eq!(flow.state(), LoginState::Idle);
    }

    #[tokio::test]
    async fn second_factor_without_pending_flow_is_an_error() {
        let client = ApiClient::new(&ApiConfig::default()).expect("client should build");
        let mut flow = LoginFlow::new(client);
        let result = flow.submit_second_factor(123_456).await;
        assert!(matches!(result, Err(AuthError::Protocol(_))));
    }

    #[test]
    fn enrollment_produces_salt_verifier_and_key() {
        let enrollment =
            enroll("Alice", b"hunter2 correct horse", &fast_params()).expect("enroll should succeed");
        assert_eq!(enrollment.salt.len(), 32);
        assert!(!enrollment.verifier.is_empty());
        assert_eq!(enrollment.vault_key.len(), 32);
    }

    #[test]
    fn enrollment_salts_are_unique_per_account() {
        let params = fast_params();
        let first = enroll("alice", b"same password", &params).expect("enroll should succeed");
        let second = enroll("alice", b"same password", &params).expect("enroll should succeed");
        assert_ne!(first.salt, second.salt);
        assert_ne!(first.verifier, second.verifier);
    }

    #[test]
    fn enrollment_rejects_invalid_params() {
        let mut params = fast_params();
        params.iterations = 0;
        let result = enroll("alice", b"password", &params);
        assert!(matches!(result, Err(AuthError::Crypto(_))));
    }

    #[test]
    fn derivation_is_reproducible_from_enrollment_salt() {
        let params = fast_params();
        let enrollment = enroll("alice", b"the password", &params).expect("enroll should succeed");
        let rederived = kdf::derive(b"the password", enrollment.salt.as_bytes(), &params)
            .expect("derive should succeed");
        assert_eq!(rederived.expose(), enrollment.vault_key.expose());
    }
}
