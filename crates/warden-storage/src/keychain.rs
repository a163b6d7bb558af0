//! OS keychain access for small secrets (the secrets-store master key).
//!
//! Wraps the `keyring` crate behind the `keychain` feature so callers that
//! don't need OS-level secret storage (most of the workspace) never link
//! against platform keychain bindings.

use crate::error::{StorageError, StorageResult};

/// Service name under which the master key is stored in the OS keychain.
const SERVICE: &str = "warden";

/// Read a secret previously written with [`set_secret`].
///
/// Returns `Ok(None)` if no entry exists yet, rather than treating a
/// missing keychain entry as an error — callers use this to probe before
/// falling back to the file-based master key.
///
/// # Errors
///
/// Returns [`StorageError::Connection`] if the keychain backend itself is
/// unreachable (as opposed to the entry simply being absent).
pub fn get_secret(account: &str) -> StorageResult<Option<Vec<u8>>> {
    let entry = keyring::Entry::new(SERVICE, account)
        .map_err(|e| StorageError::Connection(e.to_string()))?;
    match entry.get_secret() {
        Ok(bytes) => Ok(Some(bytes)),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(e) => Err(StorageError::Connection(e.to_string())),
    }
}

/// Write a secret to the OS keychain under `account`, overwriting any
/// existing entry.
///
/// # Errors
///
/// Returns [`StorageError::Connection`] if the keychain backend rejects
/// the write.
pub fn set_secret(account: &str, value: &[u8]) -> StorageResult<()> {
    let entry = keyring::Entry::new(SERVICE, account)
        .map_err(|e| StorageError::Connection(e.to_string()))?;
    entry
        .set_secret(value)
        .map_err(|e| StorageError::Connection(e.to_string()))
}
