//! HTTP client for the COFFRE API.
//!
//! Provides [`ApiClient`], a thin wrapper around `reqwest` that owns the
//! base URL, default headers, and timeout. Endpoint paths are given
//! relative (`api/v1/Auth/login`) and joined onto the configured base,
//! so deployments under a sub-path work unchanged.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::Method;
use serde::Serialize;
use tracing::debug;
use url::Url;

use crate::config::ApiConfig;
use crate::error::AuthError;

/// Marker header for requests whose failure must not trigger the
/// refresh-on-401 interceptor (the refresh and revoke calls themselves).
pub const IGNORE_FAILURE_HEADER: &str = "X-Ignore-Failure";

/// HTTP client for COFFRE API communication.
///
/// Cheap to clone; all clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
}

impl ApiClient {
    /// Build a client from the given configuration.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Config` if the base URL does not parse and
    /// `AuthError::Network` if the underlying client cannot be built.
    pub fn new(config: &ApiConfig) -> Result<Self, AuthError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        let mut base_url = Url::parse(&config.base_url).map_err(|e| {
            AuthError::Config(format!("invalid base URL {:?}: {e}", config.base_url))
        })?;
        // Joining relative endpoint paths needs a directory-style base.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self { http, base_url })
    }

    /// Absolute URL for a relative endpoint path.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Config` if the path does not join cleanly.
    pub fn endpoint(&self, path: &str) -> Result<Url, AuthError> {
        self.base_url
            .join(path)
            .map_err(|e| AuthError::Config(format!("invalid endpoint path {path:?}: {e}")))
    }

    /// POST a JSON body and return the raw response.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Network` if the request never completes.
    /// Non-success statuses are returned as responses, not errors.
    pub async fn post_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<reqwest::Response, AuthError> {
        let url = self.endpoint(path)?;
        debug!(%url, "POST");
        Ok(self.http.post(url).json(body).send().await?)
    }

    /// Like [`post_json`](Self::post_json), with the ignore-failure
    /// marker attached so a 401 on this request is never retried.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Network` if the request never completes.
    pub async fn post_json_marked<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<reqwest::Response, AuthError> {
        let url = self.endpoint(path)?;
        debug!(%url, "POST (ignore-failure)");
        Ok(self
            .http
            .post(url)
            .header(IGNORE_FAILURE_HEADER, "true")
            .json(body)
            .send()
            .await?)
    }

    /// Start building an arbitrary request against a relative path.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Config` if the path does not join cleanly.
    pub fn request(&self, method: Method, path: &str) -> Result<reqwest::RequestBuilder, AuthError> {
        Ok(self.http.request(method, self.endpoint(path)?))
    }

    /// Execute a fully built request.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Network` if the request never completes.
    pub async fn execute(&self, request: reqwest::Request) -> Result<reqwest::Response, AuthError> {
        Ok(self.http.execute(request).await?)
    }
}

// ── Tests ──────────────────────────────────────────────────────────
