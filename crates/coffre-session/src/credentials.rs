//! Credential records and URL matching.
//!
//! This module provides:
//!
//! - [`Credential`]: one login entry from the decrypted vault
//! - [`CredentialSource`]: how a vault payload turns into entries
//! - [`JsonIndexSource`]: the default JSON-array payload format
//! - [`filter_for_url`]: host-based matching for autofill lookups
//!
//! Matching is by host only. A stored entry for `example.com` matches a
//! page on `example.com` or any subdomain of it (`login.example.com`);
//! it does not match `notexample.com`. Scheme, port, and path are
//! ignored, and unparseable URLs simply never match.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::SessionError;

// ── Types ──────────────────────────────────────────────────────────

/// One login entry from the decrypted vault.
///
/// Field names mirror the vault payload's JSON. `Debug` masks the
/// password so entries can be logged while troubleshooting matching.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub id: String,
    pub service_name: String,
    #[serde(default)]
    pub service_url: Option<String>,
    pub username: String,
    #[serde(default)]
    pub password: Option<String>,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("id", &self.id)
            .field("service_name", &self.service_name)
            .field("service_url", &self.service_url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Turns a decrypted vault payload into credential entries.
///
/// The session layer treats the payload as opaque bytes; hosts plug in
/// whatever format their vault actually uses.
pub trait CredentialSource: Send + Sync {
    /// Parse `vault_payload` into entries.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::CredentialIndex` if the payload does not
    /// parse as this source's format.
    fn credentials(&self, vault_payload: &[u8]) -> Result<Vec<Credential>, SessionError>;
}

/// Default source: the payload is a JSON array of [`Credential`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonIndexSource;

impl CredentialSource for JsonIndexSource {
    fn credentials(&self, vault_payload: &[u8]) -> Result<Vec<Credential>, SessionError> {
        serde_json::from_slice(vault_payload)
            .map_err(|e| SessionError::CredentialIndex(e.to_string()))
    }
}

// ── URL matching ───────────────────────────────────────────────────

/// Entries whose stored host matches the page's host.
///
/// Entries without a `service_url`, and entries whose URL does not
/// parse, are skipped. An unparseable `page_url` matches nothing.
#[must_use]
pub fn filter_for_url(entries: &[Credential], page_url: &str) -> Vec<Credential> {
    let Some(page_host) = host_of(page_url) else {
        return Vec::new();
    };
    entries
        .iter()
        .filter(|c| {
            c.service_url
                .as_deref()
                .and_then(host_of)
                .is_some_and(|stored| hosts_match(&page_host, &stored))
        })
        .cloned()
        .collect()
}

/// `page` equals `stored`, or is a subdomain of it.
fn hosts_match(page: &str, stored: &str) -> bool {
    if page == stored {
        return true;
    }
    // Subdomain check with a label boundary: "login.example.com" matches
    // "example.com", "notexample.com" does not.
    page.len() > stored.len()
        && page.ends_with(stored)
        && page.as_bytes().get(page.len().saturating_sub(stored.len()).saturating_sub(1))
            == Some(&b'.')
}

/// Lowercased host of a URL, tolerating missing schemes.
fn host_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url)
        .or_else(|_| Url::parse(&format!("https://{url}")))
        .ok()?;
    parsed.host_str().map(str::to_ascii_lowercase)
}

// ── Unit tests ─────────────────────────────────────────────────────
