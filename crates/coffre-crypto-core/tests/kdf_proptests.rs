#![allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]

//! Property-based tests for Argon2id key derivation.

use coffre_crypto_core::kdf::{derive, KdfAlgorithm, KdfParams, KdfSettings};
use proptest::prelude::*;

/// Small params for fast property tests.
const PROP_PARAMS: KdfParams = KdfParams {
    algorithm: KdfAlgorithm::Argon2id,
    memory_kib: 32,
    iterations: 1,
    parallelism: 1,
    version: 1,
};

proptest! {
    /// Derived key is always exactly 32 bytes regardless of password/salt content.
    #[test]
    fn derive_always_32_bytes(
        password in proptest::collection::vec(any::<u8>(), 1..128),
        salt in proptest::collection::vec(any::<u8>(), 16..64),
    ) {
        let key = derive(&password, &salt, &PROP_PARAMS)
            .expect("derive should succeed with valid inputs");
        prop_assert_eq!(key.len(), 32);
    }

    /// Different params produce different keys for the same password+salt.
    #[test]
    fn different_params_different_keys(
        password in proptest::collection::vec(any::<u8>(), 1..64),
    ) {
        let salt = b"proptest_salt_16b";
        let params_b = KdfParams { iterations: 2, ..PROP_PARAMS };

        let key_a = derive(&password, salt, &PROP_PARAMS)
            .expect("derive with base params should succeed");
        let key_b = derive(&password, salt, &params_b)
            .expect("derive with stronger params should succeed");

        prop_assert_ne!(key_a.expose(), key_b.expose());
    }

    /// Any in-range settings payload merges into params that pass validation.
    #[test]
    fn in_range_overrides_always_validate(
        parallelism in 1u32..=16,
        iterations in 1u32..=64,
        memory_extra in 0u32..=65_536,
    ) {
        let memory = parallelism * 8 + memory_extra;
        let payload = format!(
            r#"{{"DegreeOfParallelism":{parallelism},"MemorySize":{memory},"Iterations":{iterations}}}"#
        );
        let params = KdfSettings::from_json(&payload)
            .expect("payload should parse")
            .into_params(KdfAlgorithm::Argon2id)
            .expect("in-range overrides should validate");
        prop_assert_eq!(params.parallelism, parallelism);
        prop_assert_eq!(params.memory_kib, memory);
        prop_assert_eq!(params.iterations, iterations);
    }

    /// Settings parsing never panics on arbitrary input.
    #[test]
    fn settings_parse_never_panics(payload in ".{0,256}") {
        let _ = KdfSettings::from_json(&payload);
    }
}
