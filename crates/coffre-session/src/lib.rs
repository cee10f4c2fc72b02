//! `coffre-session` — In-memory vault session management for COFFRE.
//!
//! Between unlocks, the decrypted vault never sits in memory as
//! plaintext: it is wrapped under an ephemeral session key that lives
//! only in this process and dies with it. This crate provides:
//!
//! - [`session`]: the explicit [`VaultSession`] context with its epoch
//!   guard against stale unlock results
//! - [`keys`]: the ephemeral [`SessionKey`] and its wrap/unwrap
//! - [`store`]: the [`SessionStore`] abstraction over host storage
//! - [`credentials`]: credential records and host-based URL matching
//! - [`service`]: the typed request channel hosts talk to
//!
//! Cryptography comes from `coffre-crypto-core`; this crate adds state,
//! concurrency, and host plumbing on top.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::arithmetic_side_effects))]

pub mod credentials;
pub mod error;
pub mod keys;
pub mod service;
pub mod session;
pub mod store;

pub use credentials::{filter_for_url, Credential, CredentialSource, JsonIndexSource};
pub use error::SessionError;
pub use keys::{SessionKey, SESSION_KEY_LEN};
pub use service::{CredentialLookup, VaultRequest, VaultService};
pub use session::{VaultReadState, VaultSession, VaultStatus};
pub use store::{MemorySessionStore, SessionStore};
