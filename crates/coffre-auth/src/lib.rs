//! `coffre-auth` — Zero-knowledge login and token lifecycle for COFFRE.
//!
//! The server never sees the master password or the vault key: login is
//! an SRP-6a exchange whose password input is the Argon2id-derived vault
//! key, and day-to-day unlocks are validated locally against a sealed
//! marker. This crate provides:
//!
//! - [`login`]: the [`LoginFlow`] state machine, enrollment, and the
//!   wire exchange with the API
//! - [`unlock`]: offline candidate-key validation against the stored
//!   marker
//! - [`tokens`]: the [`TokenManager`] with single-flight refresh and
//!   best-effort revocation
//! - [`http`]: the configured API client
//! - [`storage`]: the [`LocalStore`] abstraction for tokens and marker
//! - [`config`]: persisted API endpoint settings
//!
//! Cryptography comes from `coffre-crypto-core`; this crate adds the
//! protocol, the token plumbing, and local persistence on top.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::arithmetic_side_effects))]

pub mod config;
pub mod error;
mod handshake;
pub mod http;
pub mod login;
pub mod storage;
pub mod tokens;
pub mod unlock;

pub use config::ApiConfig;
pub use error::AuthError;
pub use http::{ApiClient, IGNORE_FAILURE_HEADER};
pub use login::{
    enroll, srp_identity, AuthenticatedLogin, Enrollment, LoginFlow, LoginOutcome, LoginState,
};
pub use storage::{
    LocalStore, MemoryLocalStore, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, UNLOCK_MARKER_KEY,
};
pub use tokens::{TokenManager, TokenPair};
pub use unlock::{check_unlock_key, store_unlock_marker, MarkerCheck};
