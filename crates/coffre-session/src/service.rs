//! Typed request service over the vault session.
//!
//! Hosts talk to the session through [`VaultService`], a cheap cloneable
//! handle that sends [`VaultRequest`] values over an mpsc channel to a
//! single owning task. Each request variant carries its own typed reply
//! sender, so a caller can only wait for the reply shape its request
//! produces; there is no stringly-typed dispatch to drift out of sync.
//!
//! The owning task is the only holder of the [`VaultSession`] reference
//! used for mutation, which serializes store/clear traffic naturally.

use std::sync::Arc;

use coffre_crypto_core::memory::SecretBuffer;
use tokio::sync::{mpsc, oneshot};

use crate::credentials::{filter_for_url, Credential, CredentialSource};
use crate::error::SessionError;
use crate::session::{VaultReadState, VaultSession, VaultStatus};

const REQUEST_QUEUE_DEPTH: usize = 32;

// ── Requests ───────────────────────────────────────────────────────

/// One request to the vault service, with its reply channel.
pub enum VaultRequest {
    /// Store the decrypted vault, rotating the session key.
    StoreVault {
        plaintext: SecretBuffer,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    /// Unwrap and return the stored vault.
    GetVault {
        reply: oneshot::Sender<Result<SecretBuffer, SessionError>>,
    },
    /// Drop all session state. Always succeeds.
    ClearVault { reply: oneshot::Sender<()> },
    /// Matching credentials for a page URL.
    CredentialsForUrl {
        url: String,
        reply: oneshot::Sender<Result<CredentialLookup, SessionError>>,
    },
    /// Current lock state.
    Status { reply: oneshot::Sender<VaultStatus> },
}

/// Outcome of a credential lookup.
///
/// `Locked` tells the caller to prompt for unlock; `NoData` means the
/// session is live but nothing is stored. Both are ordinary outcomes,
/// not errors.
#[derive(Debug)]
pub enum CredentialLookup {
    /// No session key installed.
    Locked,
    /// Unlocked, but no vault stored.
    NoData,
    /// Entries whose host matches the page.
    Matches(Vec<Credential>),
}

impl CredentialLookup {
    /// Collapse to the matched entries, treating `Locked` and `NoData`
    /// as "no matches".
    #[must_use]
    pub fn into_matches(self) -> Vec<Credential> {
        match self {
            Self::Matches(entries) => entries,
            Self::Locked | Self::NoData => Vec::new(),
        }
    }
}

// ── Service handle ─────────────────────────────────────────────────

/// Cloneable handle to the vault service task.
#[derive(Clone)]
pub struct VaultService {
    tx: mpsc::Sender<VaultRequest>,
}

impl VaultService {
    /// Spawn the service task and return a handle to it.
    ///
    /// The task exits once every handle is dropped.
    #[must_use]
    pub fn spawn(session: Arc<VaultSession>, source: Arc<dyn CredentialSource>) -> Self {
        let (tx, rx) = mpsc::channel(REQUEST_QUEUE_DEPTH);
        tokio::spawn(run(session, source, rx));
        Self { tx }
    }

    /// Store the decrypted vault, rotating the session key.
    ///
    /// Takes ownership of `plaintext` so the bytes are zeroized after the
    /// wrap, whatever the outcome.
    ///
    /// # Errors
    ///
    /// Propagates [`VaultSession::store_vault`] errors, or
    /// `SessionError::ServiceUnavailable` if the service task is gone.
    pub async fn store_vault(&self, plaintext: Vec<u8>) -> Result<(), SessionError> {
        let plaintext = SecretBuffer::from_vec(plaintext);
        self.request(|reply| VaultRequest::StoreVault { plaintext, reply })
            .await?
    }

    /// Unwrap and return the stored vault.
    ///
    /// # Errors
    ///
    /// Propagates [`VaultSession::retrieve_vault`] errors, or
    /// `SessionError::ServiceUnavailable` if the service task is gone.
    pub async fn get_vault(&self) -> Result<SecretBuffer, SessionError> {
        self.request(|reply| VaultRequest::GetVault { reply }).await?
    }

    /// Drop all session state.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::ServiceUnavailable` only if the service
    /// task is gone; the clear itself cannot fail.
    pub async fn clear_vault(&self) -> Result<(), SessionError> {
        self.request(|reply| VaultRequest::ClearVault { reply }).await
    }

    /// Matching credentials for a page URL.
    ///
    /// # Errors
    ///
    /// Propagates store and parse errors, or
    /// `SessionError::ServiceUnavailable` if the service task is gone.
    pub async fn credentials_for_url(&self, url: &str) -> Result<CredentialLookup, SessionError> {
        let url = url.to_owned();
        self.request(|reply| VaultRequest::CredentialsForUrl { url, reply })
            .await?
    }

    /// Current lock state.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::ServiceUnavailable` if the service task is
    /// gone.
    pub async fn status(&self) -> Result<VaultStatus, SessionError> {
        self.request(|reply| VaultRequest::Status { reply }).await
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> VaultRequest,
    ) -> Result<T, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| SessionError::ServiceUnavailable)?;
        rx.await.map_err(|_| SessionError::ServiceUnavailable)
    }
}

// ── Service task ───────────────────────────────────────────────────

async fn run(
    session: Arc<VaultSession>,
    source: Arc<dyn CredentialSource>,
    mut rx: mpsc::Receiver<VaultRequest>,
) {
    while let Some(request) = rx.recv().await {
        // A dropped reply receiver means the caller gave up; nothing to do.
        match request {
            VaultRequest::StoreVault { plaintext, reply } => {
                let _ = reply.send(session.store_vault(plaintext.expose()).await);
            }
            VaultRequest::GetVault { reply } => {
                let _ = reply.send(session.retrieve_vault().await);
            }
            VaultRequest::ClearVault { reply } => {
                session.clear().await;
                let _ = reply.send(());
            }
            VaultRequest::CredentialsForUrl { url, reply } => {
                let _ = reply.send(lookup(&session, &*source, &url).await);
            }
            VaultRequest::Status { reply } => {
                let _ = reply.send(session.status().await);
            }
        }
    }
    tracing::debug!("vault service task stopped: all handles dropped");
}

async fn lookup(
    session: &VaultSession,
    source: &dyn CredentialSource,
    url: &str,
) -> Result<CredentialLookup, SessionError> {
    match session.try_retrieve_vault().await? {
        VaultReadState::Locked => Ok(CredentialLookup::Locked),
        VaultReadState::Empty => Ok(CredentialLookup::NoData),
        VaultReadState::Ready(payload) => {
            let entries = source.credentials(payload.expose())?;
            Ok(CredentialLookup::Matches(filter_for_url(&entries, url)))
        }
    }
}

// ── Unit tests ─────────────────────────────────────────────────────
