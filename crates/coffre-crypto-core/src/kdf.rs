//! Argon2id key derivation for vault keys.
//!
//! This module provides:
//! - [`derive`] — derive a 256-bit vault key from a master password + salt
//! - [`KdfParams`] — serializable parameter set (travels with the vault blob)
//! - [`KdfSettings`] — strongly-typed parser for externally supplied
//!   derivation settings payloads
//! - [`generate_salt`] — per-account random salt for enrollment
//!
//! Parameters are deliberately expensive (hundreds of milliseconds on
//! commodity hardware) so offline guessing stays costly. Every encrypted
//! vault records the parameters that produced its key, so unlocking always
//! re-derives with the blob's own parameters and strengthened defaults only
//! take effect on the next re-encrypt.

use crate::error::CryptoError;
use crate::memory::SecretBuffer;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Output length of the KDF in bytes (256 bits).
const OUTPUT_LEN: usize = 32;

/// Minimum salt length in bytes. We enforce 16 (stricter than argon2's 8).
const MIN_SALT_LEN: usize = 16;

/// Length of salts produced by [`generate_salt`].
pub const SALT_LEN: usize = 16;

/// Default memory cost in KiB (19 MiB).
pub const DEFAULT_MEMORY_KIB: u32 = 19_456;

/// Default iteration count.
pub const DEFAULT_ITERATIONS: u32 = 2;

/// Default lane count.
pub const DEFAULT_PARALLELISM: u32 = 1;

/// Current parameter-set revision. Recorded in [`KdfParams`] so a client can
/// spot blobs produced under older defaults and re-encrypt opportunistically.
pub const CURRENT_PARAMS_VERSION: u8 = 1;

/// Ceiling on externally supplied memory cost (2 GiB). A hostile settings
/// payload must not be able to make the client allocate arbitrary memory.
const MAX_MEMORY_KIB: u32 = 2_097_152;

/// Ceiling on externally supplied iterations.
const MAX_ITERATIONS: u32 = 64;

/// Ceiling on externally supplied lanes.
const MAX_PARALLELISM: u32 = 16;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Derivation algorithm identifier.
///
/// Only Argon2id is implemented today; the enum exists so settings payloads
/// naming anything else fail loudly instead of silently deriving with the
/// wrong function.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum KdfAlgorithm {
    /// Argon2id, RFC 9106.
    #[serde(rename = "Argon2Id")]
    Argon2id,
}

impl KdfAlgorithm {
    /// Parse a wire identifier (the `encryptionType` field of auth
    /// responses). Matching is ASCII-case-insensitive.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::UnsupportedAlgorithm` for any identifier this
    /// build does not implement.
    pub fn from_id(id: &str) -> Result<Self, CryptoError> {
        if id.eq_ignore_ascii_case("argon2id") {
            Ok(Self::Argon2id)
        } else {
            Err(CryptoError::UnsupportedAlgorithm(id.to_owned()))
        }
    }

    /// The canonical wire identifier.
    #[must_use]
    pub const fn wire_id(self) -> &'static str {
        match self {
            Self::Argon2id => "Argon2Id",
        }
    }
}

/// Complete derivation parameter set — stored inside every vault blob.
///
/// Memory is in kibibytes (the `argon2` crate convention): the default
/// 19 MiB = `19_456`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Which derivation function these parameters drive.
    pub algorithm: KdfAlgorithm,
    /// Memory cost in kibibytes (1 KiB = 1024 bytes).
    pub memory_kib: u32,
    /// Number of passes (time cost).
    pub iterations: u32,
    /// Degree of parallelism (number of lanes).
    pub parallelism: u32,
    /// Parameter-set revision, compared against [`CURRENT_PARAMS_VERSION`].
    #[serde(default = "default_params_version")]
    pub version: u8,
}

const fn default_params_version() -> u8 {
    CURRENT_PARAMS_VERSION
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            algorithm: KdfAlgorithm::Argon2id,
            memory_kib: DEFAULT_MEMORY_KIB,
            iterations: DEFAULT_ITERATIONS,
            parallelism: DEFAULT_PARALLELISM,
            version: CURRENT_PARAMS_VERSION,
        }
    }
}

impl KdfParams {
    /// Range-check the parameter values.
    ///
    /// Applied to every externally supplied set (auth responses, parsed
    /// vault headers) before it reaches [`derive`].
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::InvalidSettings` naming the offending field.
    pub fn validate(&self) -> Result<(), CryptoError> {
        if self.parallelism == 0 || self.parallelism > MAX_PARALLELISM {
            return Err(CryptoError::InvalidSettings(format!(
                "parallelism {} outside 1..={MAX_PARALLELISM}",
                self.parallelism
            )));
        }
        if self.iterations == 0 || self.iterations > MAX_ITERATIONS {
            return Err(CryptoError::InvalidSettings(format!(
                "iterations {} outside 1..={MAX_ITERATIONS}",
                self.iterations
            )));
        }
        // RFC 9106: memory must be at least 8 KiB per lane.
        let memory_floor = self.parallelism.saturating_mul(8);
        if self.memory_kib < memory_floor || self.memory_kib > MAX_MEMORY_KIB {
            return Err(CryptoError::InvalidSettings(format!(
                "memory {} KiB outside {memory_floor}..={MAX_MEMORY_KIB}",
                self.memory_kib
            )));
        }
        Ok(())
    }

    /// Whether these parameters predate the current defaults revision.
    #[must_use]
    pub const fn is_outdated(&self) -> bool {
        self.version < CURRENT_PARAMS_VERSION
    }
}

/// Externally supplied derivation settings, as carried by auth responses.
///
/// The payload is a JSON object with the upstream field names
/// (`DegreeOfParallelism`, `MemorySize`, `Iterations`, memory in KiB).
/// Unknown fields are rejected at parse time, absent fields fall back to
/// the defaults, and the merged result is range-checked before use.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KdfSettings {
    /// Lane count override.
    #[serde(rename = "DegreeOfParallelism")]
    pub degree_of_parallelism: Option<u32>,
    /// Memory cost override, in KiB.
    #[serde(rename = "MemorySize")]
    pub memory_size: Option<u32>,
    /// Iteration count override.
    #[serde(rename = "Iterations")]
    pub iterations: Option<u32>,
}

impl KdfSettings {
    /// Parse a raw settings payload.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::InvalidSettings` if the payload is not a JSON
    /// object of the expected shape or names a field this build does not
    /// know.
    pub fn from_json(payload: &str) -> Result<Self, CryptoError> {
        serde_json::from_str(payload)
            .map_err(|e| CryptoError::InvalidSettings(format!("malformed settings payload: {e}")))
    }

    /// Merge the overrides with the defaults into a validated [`KdfParams`].
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::InvalidSettings` if the merged values fail
    /// [`KdfParams::validate`].
    pub fn into_params(self, algorithm: KdfAlgorithm) -> Result<KdfParams, CryptoError> {
        let params = KdfParams {
            algorithm,
            memory_kib: self.memory_size.unwrap_or(DEFAULT_MEMORY_KIB),
            iterations: self.iterations.unwrap_or(DEFAULT_ITERATIONS),
            parallelism: self.degree_of_parallelism.unwrap_or(DEFAULT_PARALLELISM),
            version: CURRENT_PARAMS_VERSION,
        };
        params.validate()?;
        Ok(params)
    }
}

// ---------------------------------------------------------------------------
// Core KDF
// ---------------------------------------------------------------------------

/// Derive a 256-bit vault key from a master password and salt.
///
/// Deterministic: the same password, salt, and parameters always produce
/// the same key. Returns a [`SecretBuffer`] of 32 bytes; the intermediate
/// output is zeroized after the copy.
///
/// Any password length is accepted, including empty — strength policy is
/// enforced upstream, before material reaches this function.
///
/// # Errors
///
/// Returns `CryptoError::KeyDerivation` if:
/// - The salt is shorter than 16 bytes
/// - The argon2 parameters are structurally invalid
/// - The derivation itself fails (e.g., memory allocation)
pub fn derive(
    password: &[u8],
    salt: &[u8],
    params: &KdfParams,
) -> Result<SecretBuffer, CryptoError> {
    if salt.len() < MIN_SALT_LEN {
        return Err(CryptoError::KeyDerivation(format!(
            "salt too short: {} bytes (minimum {MIN_SALT_LEN})",
            salt.len()
        )));
    }

    match params.algorithm {
        KdfAlgorithm::Argon2id => derive_argon2id(password, salt, params),
    }
}

fn derive_argon2id(
    password: &[u8],
    salt: &[u8],
    params: &KdfParams,
) -> Result<SecretBuffer, CryptoError> {
    let argon2_params = argon2::Params::new(
        params.memory_kib,
        params.iterations,
        params.parallelism,
        Some(OUTPUT_LEN),
    )
    .map_err(|e| CryptoError::KeyDerivation(format!("invalid argon2 params: {e}")))?;

    let argon2 = argon2::Argon2::new(
        argon2::Algorithm::Argon2id,
        argon2::Version::V0x13,
        argon2_params,
    );

    let mut output = [0u8; OUTPUT_LEN];
    argon2
        .hash_password_into(password, salt, &mut output)
        .map_err(|e| CryptoError::KeyDerivation(format!("argon2id derivation failed: {e}")))?;

    let result = SecretBuffer::copy_from(&output);
    output.zeroize();
    Ok(result)
}

// ---------------------------------------------------------------------------
// Salt generation
// ---------------------------------------------------------------------------

/// Generate a fresh random salt for account enrollment or password change.
///
/// # Errors
///
/// Returns `CryptoError::KeyDerivation` if the CSPRNG fails.
pub fn generate_salt() -> Result<[u8; SALT_LEN], CryptoError> {
    let mut salt = [0u8; SALT_LEN];
    OsRng
        .try_fill_bytes(&mut salt)
        .map_err(|e| CryptoError::KeyDerivation(format!("salt generation failed: {e}")))?;
    Ok(salt)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    /// Small params for fast tests — 32 KiB, 1 iteration, 1 lane.
    const TEST_PARAMS: KdfParams = KdfParams {
        algorithm: KdfAlgorithm::Argon2id,
        memory_kib: 32,
        iterations: 1,
        parallelism: 1,
        version: CURRENT_PARAMS_VERSION,
    };

    const TEST_SALT: &[u8; 16] = b"0123456789abcdef";

    #[test]
    fn derive_produces_32_byte_output() {
        let key = derive(b"password", TEST_SALT, &TEST_PARAMS).expect("derive should succeed");
        assert_eq!(key.len(), 32);
    }

    #[test]
    fn derive_is_deterministic() {
        let a = derive(b"password", TEST_SALT, &TEST_PARAMS).expect("derive should succeed");
        let b = derive(b"password", TEST_SALT, &TEST_PARAMS).expect("derive should succeed");
        assert_eq!(a.expose(), b.expose());
    }

    #[test]
    fn derive_different_salts_produce_different_keys() {
        let a = derive(b"password", b"salt_aaaaaaaaaaaaa", &TEST_PARAMS)
            .expect("derive should succeed");
        let b = derive(b"password", b"salt_bbbbbbbbbbbbb", &TEST_PARAMS)
            .expect("derive should succeed");
        assert_ne!(a.expose(), b.expose());
    }

    #[test]
    fn derive_different_passwords_produce_different_keys() {
        let a = derive(b"password_a", TEST_SALT, &TEST_PARAMS).expect("derive should succeed");
        let b = derive(b"password_b", TEST_SALT, &TEST_PARAMS).expect("derive should succeed");
        assert_ne!(a.expose(), b.expose());
    }

    #[test]
    fn derive_rejects_short_salt() {
        let err = derive(b"password", b"short", &TEST_PARAMS)
            .expect_err("derive should reject short salt");
        let msg = format!("{err}");
        assert!(msg.contains("salt too short"));
    }

    #[test]
    fn derive_output_is_masked_secret() {
        let key = derive(b"test", TEST_SALT, &TEST_PARAMS).expect("derive should succeed");
        assert_eq!(key.expose().len(), 32);
        assert_eq!(format!("{key:?}"), "SecretBuffer(***)");
    }

    #[test]
    fn algorithm_id_roundtrip() {
        let alg = KdfAlgorithm::from_id("Argon2Id").expect("known id should parse");
        assert_eq!(alg, KdfAlgorithm::Argon2id);
        assert_eq!(alg.wire_id(), "Argon2Id");
    }

    #[test]
    fn algorithm_id_is_case_insensitive() {
        assert_eq!(
            KdfAlgorithm::from_id("argon2id").expect("lowercase id should parse"),
            KdfAlgorithm::Argon2id
        );
    }

    #[test]
    fn unknown_algorithm_id_is_rejected() {
        let err = KdfAlgorithm::from_id("Pbkdf2").expect_err("unknown id should fail");
        assert!(matches!(err, CryptoError::UnsupportedAlgorithm(id) if id == "Pbkdf2"));
    }

    #[test]
    fn default_params_match_documented_defaults() {
        let p = KdfParams::default();
        assert_eq!(p.memory_kib, 19_456);
        assert_eq!(p.iterations, 2);
        assert_eq!(p.parallelism, 1);
        assert_eq!(p.version, CURRENT_PARAMS_VERSION);
        p.validate().expect("defaults should validate");
    }

    #[test]
    fn settings_full_payload_overrides_all_fields() {
        let settings = KdfSettings::from_json(
            r#"{"DegreeOfParallelism":2,"MemorySize":65536,"Iterations":3}"#,
        )
        .expect("payload should parse");
        let params = settings
            .into_params(KdfAlgorithm::Argon2id)
            .expect("merged params should validate");
        assert_eq!(params.parallelism, 2);
        assert_eq!(params.memory_kib, 65_536);
        assert_eq!(params.iterations, 3);
    }

    #[test]
    fn settings_partial_payload_falls_back_to_defaults() {
        let settings =
            KdfSettings::from_json(r#"{"Iterations":4}"#).expect("payload should parse");
        let params = settings
            .into_params(KdfAlgorithm::Argon2id)
            .expect("merged params should validate");
        assert_eq!(params.iterations, 4);
        assert_eq!(params.memory_kib, DEFAULT_MEMORY_KIB);
        assert_eq!(params.parallelism, DEFAULT_PARALLELISM);
    }

    #[test]
    fn settings_empty_payload_yields_defaults() {
        let settings = KdfSettings::from_json("{}").expect("payload should parse");
        let params = settings
            .into_params(KdfAlgorithm::Argon2id)
            .expect("merged params should validate");
        assert_eq!(params, KdfParams::default());
    }

    #[test]
    fn settings_unknown_field_is_rejected() {
        let err = KdfSettings::from_json(r#"{"MemorySize":65536,"BlockSize":8}"#)
            .expect_err("unknown field should fail");
        assert!(matches!(err, CryptoError::InvalidSettings(_)));
    }

    #[test]
    fn settings_malformed_json_is_rejected() {
        let err = KdfSettings::from_json("not json").expect_err("garbage should fail");
        assert!(matches!(err, CryptoError::InvalidSettings(_)));
    }

    #[test]
    fn settings_zero_iterations_rejected() {
        let err = KdfSettings::from_json(r#"{"Iterations":0}"#)
            .expect("payload should parse")
            .into_params(KdfAlgorithm::Argon2id)
            .expect_err("zero iterations should fail validation");
        assert!(matches!(err, CryptoError::InvalidSettings(_)));
    }

    #[test]
    fn settings_excessive_memory_rejected() {
        let err = KdfSettings::from_json(r#"{"MemorySize":4194304}"#)
            .expect("payload should parse")
            .into_params(KdfAlgorithm::Argon2id)
            .expect_err("4 GiB should fail validation");
        assert!(matches!(err, CryptoError::InvalidSettings(_)));
    }

    #[test]
    fn validate_enforces_memory_floor_per_lane() {
        let params = KdfParams {
            parallelism: 4,
            memory_kib: 16,
            ..KdfParams::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn params_serde_roundtrip() {
        let params = KdfParams {
            algorithm: KdfAlgorithm::Argon2id,
            memory_kib: 65_536,
            iterations: 3,
            parallelism: 2,
            version: 1,
        };
        let json = serde_json::to_string(&params).expect("serialize should succeed");
        assert!(json.contains("Argon2Id"));
        let deserialized: KdfParams =
            serde_json::from_str(&json).expect("deserialize should succeed");
        assert_eq!(params, deserialized);
    }

    #[test]
    fn params_version_defaults_when_absent() {
        let json = r#"{"algorithm":"Argon2Id","memory_kib":19456,"iterations":2,"parallelism":1}"#;
        let params: KdfParams = serde_json::from_str(json).expect("deserialize should succeed");
        assert_eq!(params.version, CURRENT_PARAMS_VERSION);
    }

    #[test]
    fn generated_salts_are_unique_and_sized() {
        let a = generate_salt().expect("salt generation should succeed");
        let b = generate_salt().expect("salt generation should succeed");
        assert_eq!(a.len(), SALT_LEN);
        assert_ne!(a, b);
    }
}
