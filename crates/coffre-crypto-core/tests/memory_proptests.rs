#![allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]

//! Property-based tests for secure memory types.

use coffre_crypto_core::memory::{SecretBuffer, SecretBytes};
use proptest::prelude::*;

proptest! {
    /// SecretBuffer roundtrip: from_vec(data).expose() == data
    #[test]
    fn secret_buffer_roundtrip(data in proptest::collection::vec(any::<u8>(), 0..1024)) {
        let buf = SecretBuffer::from_vec(data.clone());
        prop_assert_eq!(buf.expose(), data.as_slice());
    }

    /// SecretBuffer length is preserved
    #[test]
    fn secret_buffer_length_preserved(data in proptest::collection::vec(any::<u8>(), 0..1024)) {
        let buf = SecretBuffer::copy_from(&data);
        prop_assert_eq!(buf.len(), data.len());
        prop_assert_eq!(buf.is_empty(), data.is_empty());
    }

    /// SecretBuffer Debug output is the fixed mask, never the content.
    #[test]
    fn secret_buffer_debug_never_leaks(data in proptest::collection::vec(any::<u8>(), 1..256)) {
        let buf = SecretBuffer::from_vec(data);
        let debug = format!("{buf:?}");
        prop_assert_eq!(debug.as_str(), "SecretBuffer(***)");
    }
}

/// `SecretBytes<16>` random fill has the declared length.
#[test]
fn secret_bytes_16_random_length() {
    let salt = SecretBytes::<16>::random().expect("random should succeed");
    assert_eq!(salt.expose().len(), 16);
}

/// `SecretBytes<32>` random fill has the declared length.
#[test]
fn secret_bytes_32_random_length() {
    let key = SecretBytes::<32>::random().expect("random should succeed");
    assert_eq!(key.expose().len(), 32);
}
