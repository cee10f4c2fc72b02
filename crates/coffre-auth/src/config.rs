//! API client configuration — stored as plain JSON outside the vault.
//!
//! Readable before vault unlock so the client knows which server to talk
//! to on the login screen. Holds no secrets; tokens and the unlock marker
//! live in the host's local store, never here.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

// ── Configuration ──────────────────────────────────────────────────

/// Connection settings for the COFFRE API.
///
/// Persisted to `{data_dir}/api.json`. All fields have sensible defaults
/// via [`Default`], so a missing or partial file still yields a working
/// configuration pointed at the public server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ApiConfig {
    /// Base URL of the API server. Endpoint paths are joined onto this,
    /// so a sub-path base like `https://host/coffre/` works too.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Seconds before an in-flight request is abandoned.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// `User-Agent` sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.coffre.app".into()
}
const fn default_request_timeout() -> u64 {
    30
}
fn default_user_agent() -> String {
    concat!("coffre/", env!("CARGO_PKG_VERSION")).into()
}

// ── File I/O ───────────────────────────────────────────────────────

const CONFIG_FILE: &str = "api.json";

impl ApiConfig {
    /// Load configuration from `{data_dir}/api.json`.
    ///
    /// Returns [`Default::default()`] when the file is missing or
    /// contains invalid JSON (corrupt-file recovery).
    #[must_use]
    pub fn load(data_dir: &Path) -> Self {
        let path = data_dir.join(CONFIG_FILE);
        fs::read_to_string(&path).map_or_else(
            |_| Self::default(),
            |contents| serde_json::from_str(&contents).unwrap_or_default(),
        )
    }

    /// Persist configuration to `{data_dir}/api.json`.
    ///
    /// Uses an atomic write pattern (write to `.tmp`, then rename) to
    /// prevent corruption from partial writes or crashes.
    ///
    /// # Errors
    ///
    /// Returns an `io::Error` if the directory does not exist or the
    /// file system rejects the write/rename.
    pub fn save(&self, data_dir: &Path) -> std::io::Result<()> {
        let path = data_dir.join(CONFIG_FILE);
        let tmp = data_dir.join(".api.json.tmp");

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        fs::write(&tmp, &json)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tmp, fs::Permissions::from_mode(0o600))?;
        }

        fs::rename(&tmp, &path)?;

        Ok(())
    }
}

// ── Tests ──────────────────────────────────────────────────────────
