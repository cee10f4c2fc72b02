//! Token lifecycle: persistence, refresh, revocation, and the
//! refresh-on-401 interceptor.
//!
//! Access and refresh tokens live in host local storage under the
//! well-known keys [`ACCESS_TOKEN_KEY`] and [`REFRESH_TOKEN_KEY`].
//! Refresh is single-flight: concurrent callers coalesce onto one
//! network request and all observe the same resulting pair. A rejected
//! refresh token is terminal ([`AuthError::RefreshExhausted`]), clears
//! both stored tokens, and forces a full login.
//!
//! [`ACCESS_TOKEN_KEY`]: crate::storage::ACCESS_TOKEN_KEY
//! [`REFRESH_TOKEN_KEY`]: crate::storage::REFRESH_TOKEN_KEY

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::AuthError;
use crate::http::{ApiClient, IGNORE_FAILURE_HEADER};
use crate::storage::{LocalStore, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, UNLOCK_MARKER_KEY};

pub const REFRESH_ENDPOINT: &str = "api/v1/Auth/refresh";
pub const REVOKE_ENDPOINT: &str = "api/v1/Auth/revoke";

// ── Types ──────────────────────────────────────────────────────────

/// An access + refresh token pair, as issued and as sent back for
/// refresh and revocation. `Debug` masks both values.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub token: String,
    pub refresh_token: String,
}

impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair")
            .field("token", &"***")
            .field("refresh_token", &"***")
            .finish()
    }
}

// ── Manager ────────────────────────────────────────────────────────

/// Owns token persistence and renewal for one account.
///
/// The generation counter is how coalescing works: callers read it
/// before queueing for the gate, and a changed value once they hold the
/// gate means someone else already refreshed while they waited. The
/// read must not itself queue, hence the atomic next to the mutex.
pub struct TokenManager {
    client: ApiClient,
    store: Arc<dyn LocalStore>,
    refresh_gate: Mutex<()>,
    refresh_generation: AtomicU64,
}

impl TokenManager {
    #[must_use]
    pub fn new(client: ApiClient, store: Arc<dyn LocalStore>) -> Self {
        Self {
            client,
            store,
            refresh_gate: Mutex::new(()),
            refresh_generation: AtomicU64::new(0),
        }
    }

    /// Persist a freshly issued pair, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Storage` if the store cannot be written.
    pub fn store_pair(&self, pair: &TokenPair) -> Result<(), AuthError> {
        self.store.set(ACCESS_TOKEN_KEY, &pair.token)?;
        self.store.set(REFRESH_TOKEN_KEY, &pair.refresh_token)
    }

    /// The stored pair, or `None` if either half is missing.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Storage` if the store cannot be read.
    pub fn stored_pair(&self) -> Result<Option<TokenPair>, AuthError> {
        let token = self.store.get(ACCESS_TOKEN_KEY)?;
        let refresh_token = self.store.get(REFRESH_TOKEN_KEY)?;
        Ok(match (token, refresh_token) {
            (Some(token), Some(refresh_token)) => Some(TokenPair {
                token,
                refresh_token,
            }),
            _ => None,
        })
    }

    /// Exchange the stored pair for a fresh one.
    ///
    /// Single-flight: concurrent callers wait for the in-flight exchange
    /// and receive its result instead of issuing their own.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::RefreshExhausted` when no pair is stored or
    /// the server rejected the refresh token — both tokens are cleared
    /// and only a full login can recover. Network and 5xx failures are
    /// transient: the stored pair is kept and a later retry is allowed.
    pub async fn refresh(&self) -> Result<TokenPair, AuthError> {
        let observed = self.refresh_generation.load(Ordering::Acquire);
        let _gate = self.refresh_gate.lock().await;
        if self.refresh_generation.load(Ordering::Acquire) != observed {
            // A refresh completed while we queued; reuse its outcome.
            return self.stored_pair()?.ok_or(AuthError::RefreshExhausted);
        }

        let pair = self.stored_pair()?.ok_or(AuthError::RefreshExhausted)?;
        match self.request_refresh(&pair).await {
            Ok(fresh) => {
                self.store_pair(&fresh)?;
                self.refresh_generation.fetch_add(1, Ordering::Release);
                debug!("token pair refreshed");
                Ok(fresh)
            }
            Err(AuthError::RefreshExhausted) => {
                self.clear_stored_tokens();
                self.refresh_generation.fetch_add(1, Ordering::Release);
                warn!("refresh token rejected; stored tokens cleared");
                Err(AuthError::RefreshExhausted)
            }
            Err(e) => Err(e),
        }
    }

    async fn request_refresh(&self, pair: &TokenPair) -> Result<TokenPair, AuthError> {
        let response = self.client.post_json_marked(REFRESH_ENDPOINT, pair).await?;
        let status = response.status();
        if status.is_success() {
            let body = response.text().await?;
            return serde_json::from_str(&body).map_err(|e| {
                AuthError::Protocol(format!("malformed refresh response: {e}"))
            });
        }
        if matches!(
            status,
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        ) {
            return Err(AuthError::RefreshExhausted);
        }
        Err(AuthError::Protocol(format!(
            "refresh returned unexpected status {status}"
        )))
    }

    /// Tell the server to revoke the stored pair. Best-effort: every
    /// failure is logged and swallowed so logout always completes.
    pub async fn revoke(&self) {
        let pair = match self.stored_pair() {
            Ok(Some(pair)) => pair,
            Ok(None) => return,
            Err(e) => {
                debug!("skipping revocation, tokens unreadable: {e}");
                return;
            }
        };
        match self.client.post_json_marked(REVOKE_ENDPOINT, &pair).await {
            Ok(response) => debug!(status = %response.status(), "token revocation sent"),
            Err(e) => debug!("token revocation failed (ignored): {e}"),
        }
    }

    /// Revoke server-side, then remove the tokens and the unlock marker
    /// from local storage.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Storage` if a removal fails; all three keys
    /// are still attempted.
    pub async fn logout(&self) -> Result<(), AuthError> {
        self.revoke().await;
        let mut result = Ok(());
        for key in [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, UNLOCK_MARKER_KEY] {
            if let Err(e) = self.store.remove(key) {
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        debug!("logged out, local auth state removed");
        result
    }

    /// Send a bearer-authorized request, refreshing and retrying once on
    /// 401.
    ///
    /// Requests carrying the [`IGNORE_FAILURE_HEADER`] marker are never
    /// retried, which is what keeps the refresh call itself out of the
    /// interceptor. Requests whose body cannot be cloned (streaming) are
    /// sent once and returned as-is.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Network` if a send fails and propagates
    /// [`refresh`](Self::refresh) errors from the retry path.
    pub async fn send_authorized(
        &self,
        request: reqwest::Request,
    ) -> Result<reqwest::Response, AuthError> {
        let marked = request.headers().contains_key(IGNORE_FAILURE_HEADER);
        let retry = request.try_clone();

        let mut first = request;
        self.attach_stored_bearer(&mut first)?;
        let response = self.client.execute(first).await?;

        if response.status() != StatusCode::UNAUTHORIZED || marked {
            return Ok(response);
        }
        let Some(mut retry) = retry else {
            return Ok(response);
        };

        debug!("access token rejected, refreshing and retrying once");
        let fresh = self.refresh().await?;
        set_bearer(&mut retry, &fresh.token)?;
        self.client.execute(retry).await
    }

    fn attach_stored_bearer(&self, request: &mut reqwest::Request) -> Result<(), AuthError> {
        if let Some(token) = self.store.get(ACCESS_TOKEN_KEY)? {
            set_bearer(request, &token)?;
        }
        Ok(())
    }

    fn clear_stored_tokens(&self) {
        for key in [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY] {
            if let Err(e) = self.store.remove(key) {
                warn!("failed to remove {key}: {e}");
            }
        }
    }
}

fn set_bearer(request: &mut reqwest::Request, token: &str) -> Result<(), AuthError> {
    let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
        .map_err(|e| AuthError::Storage(format!("stored access token is not header-safe: {e}")))?;
    value.set_sensitive(true);
    request.headers_mut().insert(AUTHORIZATION, value);
    Ok(())
}

// ── Unit tests ─────────────────────────────────────────────────────
