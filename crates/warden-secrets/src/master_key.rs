//! Master-key acquisition for the secrets store.
//!
//! Acquisition order, in priority:
//!
//! 1. OS keychain (`keychain` feature) — preferred, survives reinstalls.
//! 2. `{root}/config/.master.key`, mode 0600 on Unix.
//! 3. Generate a fresh key — but only when no identity has ever written a
//!    ciphertext file. If ciphertext exists and no key can be found, this
//!    is a hard error: silently generating a new key would make every
//!    existing secret permanently unreadable.
//!
//! Once acquired, the key is persisted back to the keychain (if available)
//! or the master key file so future runs agree on it.

use std::io::Write;

use warden_core::dirs::WardenRoot;
use warden_crypto::AeadKey;

use crate::error::{SecretsError, SecretsResult};

const KEYCHAIN_ACCOUNT: &str = "master-key";

#[cfg(feature = "keychain")]
fn read_keychain() -> SecretsResult<Option<AeadKey>> {
    match warden_storage::keychain::get_secret(KEYCHAIN_ACCOUNT) {
        Ok(Some(bytes)) => Ok(Some(AeadKey::try_from_slice(&bytes)?)),
        Ok(None) => Ok(None),
        Err(e) => {
            tracing::warn!(error = %e, "OS keychain unavailable, falling back to file");
            Ok(None)
        },
    }
}

#[cfg(not(feature = "keychain"))]
fn read_keychain() -> SecretsResult<Option<AeadKey>> {
    Ok(None)
}

#[cfg(feature = "keychain")]
fn persist_to_keychain(key: &AeadKey) {
    if let Err(e) = warden_storage::keychain::set_secret(KEYCHAIN_ACCOUNT, key.as_bytes()) {
        tracing::warn!(error = %e, "failed to persist master key to OS keychain");
    }
}

#[cfg(not(feature = "keychain"))]
fn persist_to_keychain(_key: &AeadKey) {}

fn read_key_file(root: &WardenRoot) -> SecretsResult<Option<AeadKey>> {
    let path = root.master_key_path();
    if !path.exists() {
        return Ok(None);
    }

    #[cfg(unix)]
    {
        let meta = std::fs::symlink_metadata(&path)?;
        if meta.file_type().is_symlink() {
            return Err(SecretsError::MasterKeyUnavailable(
                "master key file is a symlink, refusing to read".to_string(),
            ));
        }
    }

    let bytes = std::fs::read(&path)?;
    Ok(Some(AeadKey::try_from_slice(&bytes)?))
}

fn write_key_file(root: &WardenRoot, key: &AeadKey) -> SecretsResult<()> {
    let path = root.master_key_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(&path)?;
        file.write_all(key.as_bytes())?;
        return Ok(());
    }

    #[cfg(not(unix))]
    {
        std::fs::write(&path, key.as_bytes())?;
        Ok(())
    }
}

/// Does any identity already have a ciphertext secrets file on disk? If so
/// a missing master key is a hard failure, not a cue to generate a new one.
fn any_ciphertext_exists(root: &WardenRoot) -> bool {
    let Ok(entries) = std::fs::read_dir(root.secrets_dir()) else {
        return false;
    };
    entries.filter_map(Result::ok).any(|entry| {
        entry
            .path()
            .extension()
            .is_some_and(|ext| ext == "ciphertext")
    })
}

/// Acquire the master key for the secrets store, generating one only on a
/// genuinely first run.
///
/// # Errors
///
/// Returns [`SecretsError::MasterKeyUnavailable`] if no key can be found
/// and ciphertext already exists (regenerating would orphan it), or if
/// reading/writing the key file fails.
pub fn acquire(root: &WardenRoot) -> SecretsResult<AeadKey> {
    if let Some(key) = read_keychain()? {
        return Ok(key);
    }

    if let Some(key) = read_key_file(root)? {
        return Ok(key);
    }

    if any_ciphertext_exists(root) {
        return Err(SecretsError::MasterKeyUnavailable(
            "ciphertext exists on disk but no master key was found in the keychain or at \
             config/.master.key; refusing to generate a new key that would orphan it"
                .to_string(),
        ));
    }

    let key = AeadKey::generate();
    persist_to_keychain(&key);
    write_key_file(root, &key)?;
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_and_persists_on_first_run() {
        let dir = tempfile::tempdir().unwrap();
        let root = WardenRoot::new(dir.path());
        root.ensure_scaffold().unwrap();

        let key1 = acquire(&root).unwrap();
        let key2 = acquire(&root).unwrap();

        assert_eq!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn refuses_to_regenerate_when_ciphertext_exists_without_key() {
        let dir = tempfile::tempdir().unwrap();
        let root = WardenRoot::new(dir.path());
        root.ensure_scaffold().unwrap();

        std::fs::write(root.secrets_dir().join("luma.ciphertext"), b"orphaned").unwrap();

        let result = acquire(&root);
        assert!(matches!(
            result,
            Err(SecretsError::MasterKeyUnavailable(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn key_file_has_restrictive_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let root = WardenRoot::new(dir.path());
        root.ensure_scaffold().unwrap();

        acquire(&root).unwrap();

        let perms = std::fs::metadata(root.master_key_path())
            .unwrap()
            .permissions();
        assert_eq!(perms.mode() & 0o777, 0o600);
    }
}
