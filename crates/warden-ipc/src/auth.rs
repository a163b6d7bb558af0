//! Auth token persistence and constant-time verification (spec.md §4.15,
//! §6's `{tmp}/{framework}-supervisor.token`, owner-only permissions).
//!
//! Grounded on `warden-secrets::master_key`'s file-fallback pattern: a
//! freshly generated secret, written once with owner-only permissions, and
//! loaded back on every subsequent start.

use std::path::Path;

use rand::RngCore;
use subtle::ConstantTimeEq;

use crate::error::{IpcError, IpcResult};

/// Number of random bytes backing a token (before hex encoding).
const TOKEN_BYTES: usize = 32;

/// The supervisor's IPC auth token.
///
/// Held as raw bytes; compared to a peer-supplied hex string in constant
/// time so token guessing cannot be accelerated by timing the comparison.
#[derive(Clone)]
pub struct AuthToken(Vec<u8>);

impl AuthToken {
    /// Generate a fresh random token.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = vec![0u8; TOKEN_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Hex encoding, as carried on the wire in [`crate::message::IpcMessage::auth_token`].
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Load the token from `path` if it exists, otherwise generate one and
    /// persist it with owner-only (0o600) permissions.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, written, or
    /// `chmod`-ed.
    pub fn load_or_create(path: &Path) -> IpcResult<Self> {
        if path.exists() {
            let raw = std::fs::read_to_string(path)?;
            let bytes = hex::decode(raw.trim()).map_err(|_| IpcError::AuthFailure)?;
            return Ok(Self(bytes));
        }

        let token = Self::generate();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, token.to_hex())?;
        Self::restrict_permissions(path)?;
        Ok(token)
    }

    #[cfg(unix)]
    fn restrict_permissions(path: &Path) -> std::io::Result<()> {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
    }

    #[cfg(not(unix))]
    fn restrict_permissions(_path: &Path) -> std::io::Result<()> {
        Ok(())
    }

    /// Constant-time comparison against a peer-supplied hex token.
    #[must_use]
    pub fn verify_hex(&self, candidate: &str) -> bool {
        match hex::decode(candidate) {
            Ok(candidate_bytes) => {
                candidate_bytes.len() == self.0.len() && bool::from(candidate_bytes.ct_eq(&self.0))
            }
            Err(_) => false,
        }
    }
}

impl std::fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("AuthToken").field(&"<redacted>").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_a_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("supervisor.token");

        let created = AuthToken::load_or_create(&path).expect("creates token");
        let loaded = AuthToken::load_or_create(&path).expect("loads token");
        assert_eq!(created.to_hex(), loaded.to_hex());
    }

    #[test]
    fn verify_hex_rejects_mismatch() {
        let token = AuthToken::generate();
        assert!(token.verify_hex(&token.to_hex()));
        assert!(!token.verify_hex(&AuthToken::generate().to_hex()));
        assert!(!token.verify_hex("not-hex"));
    }

    #[cfg(unix)]
    #[test]
    fn persisted_token_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("supervisor.token");
        AuthToken::load_or_create(&path).expect("creates token");

        let mode = std::fs::metadata(&path).expect("metadata").permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }
}
