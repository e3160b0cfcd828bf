//! Thread-safety shims for the linked cryptographic backend.
//!
//! The crypto libraries keep global mutable state (randomness pools,
//! session caches) that their own internals touch from any thread doing
//! cryptographic work; the only safe synchronization point is the locking
//! hooks the libraries themselves expose. Exactly one backend variant is
//! compiled per build: the indexed-table shim for OpenSSL-style backends
//! or the structured callback table for gcrypt-style backends. The binding
//! picks the feature matching the backend the native library was linked
//! against.

#[cfg(all(feature = "crypto-openssl", feature = "crypto-gnutls"))]
compile_error!(
    "features `crypto-openssl` and `crypto-gnutls` are mutually exclusive: \
     the native library links exactly one TLS backend"
);

#[cfg(feature = "crypto-gnutls")]
pub mod gnutls;
#[cfg(feature = "crypto-openssl")]
pub mod openssl;

use crate::types::CoordResult;

/// Install the active backend's shim.
///
/// `backend_lock_count` is the lock count the crypto library reports at
/// startup; the table-based backend sizes nothing up front and ignores it.
/// The registration call into the library itself belongs to the binding
/// layer, which takes the hooks from the active variant's module.
#[cfg(feature = "crypto-openssl")]
pub fn install(backend_lock_count: usize) -> CoordResult<()> {
    openssl::init(backend_lock_count)
}

#[cfg(all(feature = "crypto-gnutls", not(feature = "crypto-openssl")))]
pub fn install(backend_lock_count: usize) -> CoordResult<()> {
    let _ = backend_lock_count;
    gnutls::init();
    Ok(())
}

/// Tear down the active backend's shim. Idempotent.
#[cfg(feature = "crypto-openssl")]
pub fn teardown() {
    openssl::cleanup();
}

#[cfg(all(feature = "crypto-gnutls", not(feature = "crypto-openssl")))]
pub fn teardown() {
    gnutls::cleanup();
}
