#![allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]

//! End-to-end unlock flow: enrollment, marker validation, re-unlock.
//!
//! Exercises the composition the higher layers rely on — derive a key from
//! a master password, seal the vault and the unlock marker, then come back
//! later with only the password and the stored artifacts.

use coffre_crypto_core::kdf::{self, KdfAlgorithm, KdfParams};
use coffre_crypto_core::marker::{seal_marker, verify_marker_bytes};
use coffre_crypto_core::vault::{encrypt_vault, unlock, EncryptedVaultBlob};

/// Small params so the suite stays fast.
fn test_params() -> KdfParams {
    KdfParams {
        algorithm: KdfAlgorithm::Argon2id,
        memory_kib: 32,
        iterations: 1,
        parallelism: 1,
        version: 1,
    }
}

/// Enroll: fresh salt, derived key, sealed vault, sealed marker.
fn enroll(password: &[u8], payload: &[u8]) -> (EncryptedVaultBlob, Vec<u8>) {
    let salt = kdf::generate_salt().expect("salt generation should succeed");
    let key = kdf::derive(password, &salt, &test_params()).expect("derive should succeed");
    let blob = encrypt_vault(key.expose(), &test_params(), &salt, 1, payload)
        .expect("encrypt should succeed");
    let marker = seal_marker(key.expose()).expect("marker seal should succeed");
    (blob, marker.to_bytes())
}

// ---------------------------------------------------------------------------
// Unlock with the password alone
// ---------------------------------------------------------------------------

#[test]
fn password_plus_stored_blob_recovers_payload() {
    let (blob, _) = enroll(b"correct horse battery staple", b"vault contents");

    let stored = blob.to_bytes().expect("to_bytes should succeed");
    let parsed = EncryptedVaultBlob::from_bytes(&stored).expect("from_bytes should succeed");
    let unlocked = unlock(b"correct horse battery staple", &parsed).expect("unlock should succeed");

    assert_eq!(unlocked.payload.expose(), b"vault contents");
}

#[test]
fn wrong_password_fails_unlock() {
    let (blob, _) = enroll(b"right password", b"vault contents");
    assert!(unlock(b"wrong password", &blob).is_err());
}

// ---------------------------------------------------------------------------
// Marker as the cheap pre-check
// ---------------------------------------------------------------------------

#[test]
fn rederived_key_validates_against_stored_marker() {
    let password = b"the master password";
    let (blob, marker_bytes) = enroll(password, b"payload");

    // Later session: only the password and the blob header survive.
    let candidate = kdf::derive(password, &blob.header.salt, &blob.header.kdf)
        .expect("re-derive should succeed");
    assert!(verify_marker_bytes(candidate.expose(), &marker_bytes));
}

#[test]
fn wrong_password_key_fails_marker_check() {
    let (blob, marker_bytes) = enroll(b"right password", b"payload");

    let candidate = kdf::derive(b"wrong password", &blob.header.salt, &blob.header.kdf)
        .expect("derive should succeed");
    assert!(!verify_marker_bytes(candidate.expose(), &marker_bytes));
}

#[test]
fn marker_pass_implies_vault_opens() {
    let password = b"consistency check";
    let (blob, marker_bytes) = enroll(password, b"payload");

    let candidate = kdf::derive(password, &blob.header.salt, &blob.header.kdf)
        .expect("derive should succeed");
    if verify_marker_bytes(candidate.expose(), &marker_bytes) {
        let opened = coffre_crypto_core::vault::decrypt_vault(candidate.expose(), &blob)
            .expect("marker pass must imply the vault opens");
        assert_eq!(opened.expose(), b"payload");
    } else {
        panic!("marker should verify for the correct password");
    }
}

// ---------------------------------------------------------------------------
// Revision supersession
// ---------------------------------------------------------------------------

#[test]
fn reencrypt_supersedes_with_higher_revision() {
    let password = b"revision test";
    let (blob, _) = enroll(password, b"version one");

    let unlocked = unlock(password, &blob).expect("unlock should succeed");
    let next = encrypt_vault(
        unlocked.vault_key.expose(),
        &blob.header.kdf,
        &blob.header.salt,
        blob.header.revision + 1,
        b"version two",
    )
    .expect("re-encrypt should succeed");

    assert_eq!(next.header.revision, blob.header.revision + 1);
    assert_ne!(next.blob_id(), blob.blob_id());

    // Both blobs remain independently decryptable; the store keeps the newest.
    let old = unlock(password, &blob).expect("old revision should still open");
    let new = unlock(password, &next).expect("new revision should open");
    assert_eq!(old.payload.expose(), b"version one");
    assert_eq!(new.payload.expose(), b"version two");
}
