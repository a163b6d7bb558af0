//! Per-identity encrypted secrets store (spec.md §4.3).
//!
//! Each identity gets its own ciphertext file (`{identity}.ciphertext`) and
//! a small plaintext metadata sidecar (`{identity}.metadata`) recording the
//! store's format version. The plaintext map itself never touches disk.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use warden_core::dirs::WardenRoot;
use warden_crypto::AeadKey;

use crate::error::{SecretsError, SecretsResult};

const METADATA_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Metadata {
    version: u32,
    updated_at: DateTime<Utc>,
}

/// An identity's decrypted secrets, held in memory only for as long as the
/// store is open.
pub struct SecretsStore {
    identity: String,
    key: AeadKey,
    values: BTreeMap<String, String>,
    ciphertext_path: std::path::PathBuf,
    metadata_path: std::path::PathBuf,
}

impl SecretsStore {
    /// Open (or initialize) the secrets store for `identity` under `root`,
    /// using `key` for authenticated decryption.
    ///
    /// # Errors
    ///
    /// Returns [`SecretsError::DecryptionFailed`] if ciphertext exists but
    /// does not verify under `key` (wrong master key, or tampering) —
    /// secrets are never silently dropped or treated as empty in that case.
    pub fn open(root: &WardenRoot, identity: &str, key: AeadKey) -> SecretsResult<Self> {
        let ciphertext_path = root
            .secrets_ciphertext_path(identity)
            .map_err(|e| SecretsError::InvalidMetadata(e.to_string()))?;
        let metadata_path = root
            .secrets_metadata_path(identity)
            .map_err(|e| SecretsError::InvalidMetadata(e.to_string()))?;

        let values = if ciphertext_path.exists() {
            let blob = std::fs::read(&ciphertext_path)?;
            let plaintext = key.open(&blob)?;
            serde_json::from_slice(&plaintext)?
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            identity: identity.to_string(),
            key,
            values,
            ciphertext_path,
            metadata_path,
        })
    }

    /// The identity this store belongs to.
    #[must_use]
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Read a secret value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Check whether a secret is present without exposing its value.
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// List configured secret keys (never values).
    #[must_use]
    pub fn list_keys(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }

    /// Set a secret value and persist the store immediately.
    ///
    /// # Errors
    ///
    /// Returns [`SecretsError::Io`] if the ciphertext or metadata file
    /// cannot be written.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> SecretsResult<()> {
        self.values.insert(key.into(), value.into());
        self.save()
    }

    /// Remove a secret, persisting the store immediately. Returns `true`
    /// if the key was present.
    ///
    /// # Errors
    ///
    /// Returns [`SecretsError::Io`] if the ciphertext or metadata file
    /// cannot be written.
    pub fn remove(&mut self, key: &str) -> SecretsResult<bool> {
        let existed = self.values.remove(key).is_some();
        if existed {
            self.save()?;
        }
        Ok(existed)
    }

    fn save(&self) -> SecretsResult<()> {
        if let Some(parent) = self.ciphertext_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let plaintext = serde_json::to_vec(&self.values)?;
        let blob = self.key.seal(&plaintext);
        write_atomic(&self.ciphertext_path, &blob)?;

        let metadata = Metadata {
            version: METADATA_VERSION,
            updated_at: Utc::now(),
        };
        write_atomic(&self.metadata_path, &serde_json::to_vec(&metadata)?)?;

        Ok(())
    }
}

/// Write `data` to `path` via a temp-file-then-rename, with 0o600
/// permissions on Unix, so a crash mid-write never leaves a partial file
/// in place of a good one.
fn write_atomic(path: &std::path::Path, data: &[u8]) -> std::io::Result<()> {
    let tmp_path = path.with_extension("tmp");

    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(&tmp_path)?;
        file.write_all(data)?;
    }

    #[cfg(not(unix))]
    std::fs::write(&tmp_path, data)?;

    std::fs::rename(&tmp_path, path)
}

impl std::fmt::Debug for SecretsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretsStore")
            .field("identity", &self.identity)
            .field("key_count", &self.values.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_roundtrip_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let root = WardenRoot::new(dir.path());
        root.ensure_scaffold().unwrap();
        let key = AeadKey::generate();

        {
            let mut store = SecretsStore::open(&root, "luma", AeadKey::from_bytes(*key.as_bytes()))
                .unwrap();
            store.set("weather_api_key", "abc123").unwrap();
        }

        let reopened =
            SecretsStore::open(&root, "luma", AeadKey::from_bytes(*key.as_bytes())).unwrap();
        assert_eq!(reopened.get("weather_api_key"), Some("abc123"));
        assert!(reopened.has("weather_api_key"));
        assert_eq!(reopened.list_keys(), vec!["weather_api_key".to_string()]);
    }

    #[test]
    fn wrong_key_rejects_on_open() {
        let dir = tempfile::tempdir().unwrap();
        let root = WardenRoot::new(dir.path());
        root.ensure_scaffold().unwrap();

        let key = AeadKey::generate();
        {
            let mut store =
                SecretsStore::open(&root, "luma", AeadKey::from_bytes(*key.as_bytes())).unwrap();
            store.set("k", "v").unwrap();
        }

        let wrong_key = AeadKey::generate();
        let result = SecretsStore::open(&root, "luma", wrong_key);
        assert!(matches!(result, Err(SecretsError::DecryptionFailed(_))));
    }

    #[test]
    fn remove_deletes_key() {
        let dir = tempfile::tempdir().unwrap();
        let root = WardenRoot::new(dir.path());
        root.ensure_scaffold().unwrap();

        let mut store = SecretsStore::open(&root, "luma", AeadKey::generate()).unwrap();
        store.set("k", "v").unwrap();
        assert!(store.remove("k").unwrap());
        assert!(!store.has("k"));
        assert!(!store.remove("k").unwrap());
    }

    #[test]
    fn identities_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let root = WardenRoot::new(dir.path());
        root.ensure_scaffold().unwrap();
        let key = AeadKey::generate();

        let mut a =
            SecretsStore::open(&root, "alpha", AeadKey::from_bytes(*key.as_bytes())).unwrap();
        a.set("shared_name", "alpha-value").unwrap();

        let b = SecretsStore::open(&root, "bravo", AeadKey::from_bytes(*key.as_bytes())).unwrap();
        assert_eq!(b.get("shared_name"), None);
    }
}
