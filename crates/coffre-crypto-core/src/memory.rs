//! Secure memory containers for key material and decrypted vault bytes.
//!
//! This module provides:
//! - [`SecretBuffer`] — variable-length secrets (derived keys, plaintext vaults)
//! - [`SecretBytes`] — fixed-length secrets (session keys, salts)
//! - `mlock`-backed page residency so secrets stay out of swap
//! - Masked `Debug`/`Display` so secrets cannot reach logs by accident
//! - [`disable_core_dumps`] for processes that hold unlocked vaults

use crate::error::CryptoError;
use rand::rngs::OsRng;
use rand::RngCore;
use secrecy::{ExposeSecret, SecretSlice};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

// ---------------------------------------------------------------------------
// Page residency
// ---------------------------------------------------------------------------

/// RAII guard pinning a memory region into RAM.
///
/// Locks the region via `mlock` on creation and releases it with `munlock`
/// on drop. Locking is best-effort: when the kernel refuses (quota,
/// privileges), the guard records the failure and the secret still gets its
/// zeroize-on-drop guarantee, just without swap protection.
pub struct MemLock {
    ptr: *const u8,
    len: usize,
    resident: bool,
}

// SAFETY: the pointer is only ever passed to mlock/munlock, which are
// thread-safe syscalls. The bytes themselves are owned and accessed by
// SecretBuffer/SecretBytes, never through MemLock.
unsafe impl Send for MemLock {}
unsafe impl Sync for MemLock {}

impl MemLock {
    /// Pin a region. `pub(crate)` because the caller must guarantee the
    /// pointer stays valid for the guard's lifetime; external code goes
    /// through [`SecretBuffer`] / [`SecretBytes`] instead.
    #[must_use]
    pub(crate) fn pin(ptr: *const u8, len: usize) -> Self {
        let resident = platform::try_mlock(ptr, len);
        if !resident && len > 0 {
            static WARNED: std::sync::Once = std::sync::Once::new();
            WARNED.call_once(|| {
                eprintln!(
                    "[coffre-crypto-core] WARNING: mlock failed — \
                     secret data may be swapped to disk. \
                     Consider raising RLIMIT_MEMLOCK."
                );
            });
        }
        Self { ptr, len, resident }
    }

    /// Whether the region is actually pinned in RAM.
    #[must_use]
    pub const fn is_resident(&self) -> bool {
        self.resident
    }
}

impl Drop for MemLock {
    fn drop(&mut self) {
        if self.resident {
            platform::try_munlock(self.ptr, self.len);
        }
    }
}

// ---------------------------------------------------------------------------
// SecretBuffer — variable-length
// ---------------------------------------------------------------------------

/// Variable-length container for sensitive bytes.
///
/// Backed by [`SecretSlice<u8>`] from `secrecy` (zeroize on drop), with the
/// pages pinned via `mlock` and all formatting masked. Derived vault keys
/// and decrypted vault payloads travel through this type so no code path
/// ever holds them in a plain `Vec<u8>`.
pub struct SecretBuffer {
    inner: SecretSlice<u8>,
    lock: MemLock,
}

impl SecretBuffer {
    /// Take ownership of `data` as a secret. No copy is made; the vector's
    /// allocation becomes the protected region and is zeroized on drop.
    #[must_use]
    pub fn from_vec(data: Vec<u8>) -> Self {
        let inner: SecretSlice<u8> = data.into();
        let exposed = inner.expose_secret();
        let lock = MemLock::pin(exposed.as_ptr(), exposed.len());
        Self { inner, lock }
    }

    /// Copy `data` into a fresh protected allocation. The caller remains
    /// responsible for zeroizing the source.
    #[must_use]
    pub fn copy_from(data: &[u8]) -> Self {
        Self::from_vec(data.to_vec())
    }

    /// A buffer of `len` cryptographically random bytes.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::SecureMemory` if the CSPRNG fails.
    pub fn random(len: usize) -> Result<Self, CryptoError> {
        let mut bytes = vec![0u8; len];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| CryptoError::SecureMemory(format!("CSPRNG fill failed: {e}")))?;
        Ok(Self::from_vec(bytes))
    }

    /// Expose the raw bytes for a cryptographic operation.
    ///
    /// The slice borrows `self`; keep the exposure to a single expression
    /// rather than binding it somewhere long-lived.
    #[must_use]
    pub fn expose(&self) -> &[u8] {
        self.inner.expose_secret()
    }

    /// Number of bytes held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.expose_secret().len()
    }

    /// Whether the buffer holds zero bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the backing pages are pinned in RAM.
    #[must_use]
    pub const fn is_resident(&self) -> bool {
        self.lock.is_resident()
    }
}

impl fmt::Debug for SecretBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretBuffer(***)")
    }
}

impl fmt::Display for SecretBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretBuffer(***)")
    }
}

// ---------------------------------------------------------------------------
// SecretBytes<N> — fixed-size
// ---------------------------------------------------------------------------

/// Fixed-size secret for keys and salts whose length is known at compile
/// time. Derives `Zeroize` + `ZeroizeOnDrop` so the bytes are erased when
/// the value goes out of scope.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SecretBytes<const N: usize> {
    bytes: [u8; N],
    // The lock is excluded from zeroize; its own Drop runs munlock.
    #[zeroize(skip)]
    lock: MemLock,
}

impl<const N: usize> SecretBytes<N> {
    /// Move a fixed-size array into protected storage.
    ///
    /// `mlock` pins the address the bytes occupy at construction time. If
    /// the value is moved afterwards the guard still references the old
    /// address; `munlock` on a stale address is a harmless no-op and the
    /// zeroize-on-drop guarantee does not depend on residency.
    #[must_use]
    pub fn new(data: [u8; N]) -> Self {
        // Phase one uses an unpinned placeholder so `bytes` has a stable
        // address before the real pin is taken.
        let mut s = Self {
            bytes: data,
            lock: MemLock {
                ptr: std::ptr::null(),
                len: 0,
                resident: false,
            },
        };
        s.lock = MemLock::pin(s.bytes.as_ptr(), N);
        s
    }

    /// A fresh secret of `N` cryptographically random bytes.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::SecureMemory` if the CSPRNG fails.
    pub fn random() -> Result<Self, CryptoError> {
        let mut bytes = [0u8; N];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| CryptoError::SecureMemory(format!("CSPRNG fill failed: {e}")))?;
        Ok(Self::new(bytes))
    }

    /// Expose the raw bytes for a cryptographic operation.
    #[must_use]
    pub const fn expose(&self) -> &[u8; N] {
        &self.bytes
    }
}

impl<const N: usize> fmt::Debug for SecretBytes<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretBytes<{N}>(***)")
    }
}

impl<const N: usize> fmt::Display for SecretBytes<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretBytes<{N}>(***)")
    }
}

impl<const N: usize> From<[u8; N]> for SecretBytes<N> {
    fn from(data: [u8; N]) -> Self {
        Self::new(data)
    }
}

// ---------------------------------------------------------------------------
// Core dumps
// ---------------------------------------------------------------------------

/// Disable core dumps for the current process.
///
/// A crash while a vault is unlocked must not write key material to disk.
/// On Unix this sets `RLIMIT_CORE` to 0 (soft and hard); elsewhere it is a
/// no-op.
///
/// # Errors
///
/// Returns `CryptoError::SecureMemory` if `setrlimit` fails.
pub fn disable_core_dumps() -> Result<(), CryptoError> {
    platform::disable_core_dumps_impl()
}

// ---------------------------------------------------------------------------
// Platform backends
// ---------------------------------------------------------------------------

#[cfg(unix)]
mod platform {
    use crate::error::CryptoError;

    pub(super) fn try_mlock(ptr: *const u8, len: usize) -> bool {
        if len == 0 {
            return true;
        }
        // SAFETY: mlock accepts any valid pointer/length pair; an invalid
        // region makes the kernel return ENOMEM, reported as `false`.
        unsafe { libc::mlock(ptr.cast(), len) == 0 }
    }

    pub(super) fn try_munlock(ptr: *const u8, len: usize) {
        if len == 0 {
            return;
        }
        // SAFETY: munlock failure is non-critical.
        unsafe {
            libc::munlock(ptr.cast(), len);
        }
    }

    pub(super) fn disable_core_dumps_impl() -> Result<(), CryptoError> {
        let limit = libc::rlimit {
            rlim_cur: 0,
            rlim_max: 0,
        };
        // SAFETY: setrlimit with RLIMIT_CORE is a standard POSIX call.
        let ret = unsafe { libc::setrlimit(libc::RLIMIT_CORE, &raw const limit) };
        if ret != 0 {
            return Err(CryptoError::SecureMemory(
                "failed to disable core dumps via RLIMIT_CORE".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(not(unix))]
mod platform {
    use crate::error::CryptoError;

    pub(super) fn try_mlock(_ptr: *const u8, _len: usize) -> bool {
        false
    }

    pub(super) fn try_munlock(_ptr: *const u8, _len: usize) {}

    pub(super) fn disable_core_dumps_impl() -> Result<(), CryptoError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_vec_takes_ownership_without_altering_content() {
        let buf = SecretBuffer::from_vec(b"vault key material".to_vec());
        assert_eq!(buf.expose(), b"vault key material");
        assert_eq!(buf.len(), 18);
        assert!(!buf.is_empty());
    }

    #[test]
    fn copy_from_matches_source() {
        let buf = SecretBuffer::copy_from(b"derived bytes");
        assert_eq!(buf.expose(), b"derived bytes");
    }

    #[test]
    fn empty_buffer_reports_empty() {
        let buf = SecretBuffer::from_vec(Vec::new());
        assert!(buf.is_empty());
        assert_eq!(buf.len(), 0);
    }

    #[test]
    fn random_buffers_are_unique() {
        let a = SecretBuffer::random(32).expect("random should succeed");
        let b = SecretBuffer::random(32).expect("random should succeed");
        assert_eq!(a.len(), 32);
        assert_eq!(b.len(), 32);
        assert_ne!(a.expose(), b.expose());
    }

    #[test]
    fn random_buffer_is_not_all_zero() {
        let buf = SecretBuffer::random(64).expect("random should succeed");
        assert!(buf.expose().iter().any(|&b| b != 0));
    }

    #[test]
    fn secret_buffer_debug_is_masked() {
        let buf = SecretBuffer::copy_from(b"master password");
        let debug = format!("{buf:?}");
        assert_eq!(debug, "SecretBuffer(***)");
        assert!(!debug.contains("master"));
        assert!(!debug.contains("password"));
    }

    #[test]
    fn secret_buffer_display_is_masked() {
        let buf = SecretBuffer::copy_from(b"master password");
        assert_eq!(format!("{buf}"), "SecretBuffer(***)");
    }

    #[test]
    fn secret_buffer_mask_is_content_independent() {
        let a = SecretBuffer::from_vec(vec![0xDE; 64]);
        let b = SecretBuffer::from_vec(vec![0x42; 64]);
        let debug_a = format!("{a:?}");
        assert_eq!(debug_a, format!("{b:?}"));
        assert_eq!(debug_a, "SecretBuffer(***)");
        assert!(!debug_a.contains("222")); // 0xDE = 222
        assert!(!debug_a.contains("66")); // 0x42 = 66
    }

    #[test]
    fn secret_bytes_roundtrip() {
        let data: [u8; 32] = [0xAB; 32];
        let key = SecretBytes::new(data);
        assert_eq!(key.expose(), &data);
    }

    #[test]
    fn secret_bytes_random_has_declared_length() {
        let key = SecretBytes::<32>::random().expect("random should succeed");
        assert_eq!(key.expose().len(), 32);
        let salt = SecretBytes::<16>::random().expect("random should succeed");
        assert_eq!(salt.expose().len(), 16);
    }

    #[test]
    fn secret_bytes_random_values_differ() {
        let a = SecretBytes::<32>::random().expect("random should succeed");
        let b = SecretBytes::<32>::random().expect("random should succeed");
        assert_ne!(a.expose(), b.expose());
    }

    #[test]
    fn secret_bytes_debug_is_masked() {
        let key = SecretBytes::<32>::new([0xFF; 32]);
        let debug = format!("{key:?}");
        assert_eq!(debug, "SecretBytes<32>(***)");
        assert!(!debug.contains("ff"));
        assert!(!debug.contains("FF"));
    }

    #[test]
    fn secret_bytes_display_is_masked() {
        let key = SecretBytes::<32>::new([0xFF; 32]);
        assert_eq!(format!("{key}"), "SecretBytes<32>(***)");
    }

    #[test]
    fn secret_bytes_from_array() {
        let data: [u8; 16] = [0x42; 16];
        let key: SecretBytes<16> = data.into();
        assert_eq!(key.expose(), &data);
    }

    #[cfg(unix)]
    #[test]
    fn residency_status_is_reported() {
        let buf = SecretBuffer::copy_from(b"pinned region probe");
        let _resident = buf.is_resident();
    }

    #[cfg(unix)]
    #[test]
    fn disable_core_dumps_zeroes_rlimit_core() {
        disable_core_dumps().expect("disable_core_dumps should succeed");

        let mut limit = libc::rlimit {
            rlim_cur: 1,
            rlim_max: 1,
        };
        let ret = unsafe { libc::getrlimit(libc::RLIMIT_CORE, &raw mut limit) };
        assert_eq!(ret, 0);
        assert_eq!(limit.rlim_cur, 0);
        assert_eq!(limit.rlim_max, 0);
    }
}
