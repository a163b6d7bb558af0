//! Filesystem layout (spec.md §6, bit-exact where compatibility matters).
//!
//! ```text
//! {root}/config/{framework_name}.yaml             global settings
//! {root}/config/identities/{identity}.yaml        per-identity config
//! {root}/config/secrets/{identity}.ciphertext      per-identity encrypted store
//! {root}/config/secrets/{identity}.metadata        nonce/version
//! {root}/data/{identity}/                          per-identity data dir
//! {root}/data/{identity}/audit.db/                 audit store
//! {root}/data/{identity}/{plugin}/                 per-plugin isolated data
//! {root}/logs/{identity}/                          per-identity log dir
//! {tmp}/{framework}-supervisor.sock                IPC endpoint, 0o600
//! {tmp}/{framework}-supervisor.token               auth token, 0o600
//! ```

use std::path::{Path, PathBuf};

use crate::identity::validate_identity_name;

/// Name of the framework, used for the global config file name and the
/// IPC socket/token file names.
pub const FRAMEWORK_NAME: &str = "warden";

/// Root of the on-disk layout. All per-identity paths are derived from
/// this and are guaranteed disjoint across identities because the
/// identity name is validated before being used as a path component
/// (spec.md §8 invariant: identity roots are disjoint).
#[derive(Debug, Clone)]
pub struct WardenRoot {
    root: PathBuf,
}

impl WardenRoot {
    /// Wrap an existing root directory. Does not create anything on disk.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve the default root: `$WARDEN_HOME` if set, else `~/.warden`.
    #[must_use]
    pub fn resolve_default() -> Self {
        if let Ok(custom) = std::env::var("WARDEN_HOME") {
            return Self::new(custom);
        }
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
        Self::new(PathBuf::from(home).join(".warden"))
    }

    /// The root path itself.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// `{root}/config/`.
    #[must_use]
    pub fn config_dir(&self) -> PathBuf {
        self.root.join("config")
    }

    /// `{root}/config/{framework_name}.yaml`.
    #[must_use]
    pub fn global_config_path(&self) -> PathBuf {
        self.config_dir().join(format!("{FRAMEWORK_NAME}.yaml"))
    }

    /// `{root}/config/identities/{identity}.yaml`.
    ///
    /// # Errors
    ///
    /// Returns an error if `identity` fails [`validate_identity_name`].
    pub fn identity_config_path(&self, identity: &str) -> Result<PathBuf, crate::ConfigError> {
        validate_identity_name(identity)?;
        Ok(self
            .config_dir()
            .join("identities")
            .join(format!("{identity}.yaml")))
    }

    /// `{root}/config/identities/{identity}.persona.yaml` — optional, may
    /// not exist (spec.md §4.14 treats a missing persona file as "no
    /// persona" rather than an error).
    ///
    /// # Errors
    ///
    /// Returns an error if `identity` fails [`validate_identity_name`].
    pub fn persona_config_path(&self, identity: &str) -> Result<PathBuf, crate::ConfigError> {
        validate_identity_name(identity)?;
        Ok(self
            .config_dir()
            .join("identities")
            .join(format!("{identity}.persona.yaml")))
    }

    /// `{root}/config/secrets/`.
    #[must_use]
    pub fn secrets_dir(&self) -> PathBuf {
        self.config_dir().join("secrets")
    }

    /// `{root}/config/secrets/{identity}.ciphertext`.
    ///
    /// # Errors
    ///
    /// Returns an error if `identity` fails [`validate_identity_name`].
    pub fn secrets_ciphertext_path(&self, identity: &str) -> Result<PathBuf, crate::ConfigError> {
        validate_identity_name(identity)?;
        Ok(self.secrets_dir().join(format!("{identity}.ciphertext")))
    }

    /// `{root}/config/secrets/{identity}.metadata`.
    ///
    /// # Errors
    ///
    /// Returns an error if `identity` fails [`validate_identity_name`].
    pub fn secrets_metadata_path(&self, identity: &str) -> Result<PathBuf, crate::ConfigError> {
        validate_identity_name(identity)?;
        Ok(self.secrets_dir().join(format!("{identity}.metadata")))
    }

    /// `{root}/config/.master.key` — file fallback for the secrets master
    /// key (spec.md §4.3).
    #[must_use]
    pub fn master_key_path(&self) -> PathBuf {
        self.config_dir().join(".master.key")
    }

    /// `{root}/data/{identity}/`.
    ///
    /// # Errors
    ///
    /// Returns an error if `identity` fails [`validate_identity_name`].
    pub fn data_dir(&self, identity: &str) -> Result<PathBuf, crate::ConfigError> {
        validate_identity_name(identity)?;
        Ok(self.root.join("data").join(identity))
    }

    /// `{root}/data/{identity}/audit.db`.
    ///
    /// # Errors
    ///
    /// Returns an error if `identity` fails [`validate_identity_name`].
    pub fn audit_db_path(&self, identity: &str) -> Result<PathBuf, crate::ConfigError> {
        Ok(self.data_dir(identity)?.join("audit.db"))
    }

    /// `{root}/data/{identity}/{plugin}/`.
    ///
    /// # Errors
    ///
    /// Returns an error if `identity` fails [`validate_identity_name`].
    pub fn plugin_data_dir(&self, identity: &str, plugin: &str) -> Result<PathBuf, crate::ConfigError> {
        Ok(self.data_dir(identity)?.join(plugin))
    }

    /// `{root}/logs/{identity}/`.
    ///
    /// # Errors
    ///
    /// Returns an error if `identity` fails [`validate_identity_name`].
    pub fn log_dir(&self, identity: &str) -> Result<PathBuf, crate::ConfigError> {
        validate_identity_name(identity)?;
        Ok(self.root.join("logs").join(identity))
    }

    /// Create every directory this root needs up front (`config/`,
    /// `config/identities/`, `config/secrets/`, `data/`, `logs/`).
    ///
    /// # Errors
    ///
    /// Returns an error if any directory cannot be created.
    pub fn ensure_scaffold(&self) -> std::io::Result<()> {
        for dir in [
            self.config_dir().join("identities"),
            self.secrets_dir(),
            self.root.join("data"),
            self.root.join("logs"),
        ] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

/// Path to the supervisor's local IPC socket: `{tmp}/{framework}-supervisor.sock`.
#[must_use]
pub fn supervisor_socket_path() -> PathBuf {
    std::env::temp_dir().join(format!("{FRAMEWORK_NAME}-supervisor.sock"))
}

/// Path to the supervisor's auth token file: `{tmp}/{framework}-supervisor.token`.
#[must_use]
pub fn supervisor_token_path() -> PathBuf {
    std::env::temp_dir().join(format!("{FRAMEWORK_NAME}-supervisor.token"))
}

/// Name of the supervisor's own data/log subdirectory. Not a valid
/// identity name (fails [`validate_identity_name`]'s leading-letter
/// rule... actually starts with `_`, which the regex also rejects), so it
/// can never collide with a real identity directory.
const SUPERVISOR_DIR_NAME: &str = "_supervisor";

impl WardenRoot {
    /// `{root}/data/_supervisor/` — the supervisor's own audit store and
    /// working data, disjoint from every per-identity `data_dir`.
    #[must_use]
    pub fn supervisor_data_dir(&self) -> PathBuf {
        self.root.join("data").join(SUPERVISOR_DIR_NAME)
    }

    /// `{root}/data/_supervisor/audit.db`.
    #[must_use]
    pub fn supervisor_audit_db_path(&self) -> PathBuf {
        self.supervisor_data_dir().join("audit.db")
    }

    /// `{root}/logs/_supervisor/`.
    #[must_use]
    pub fn supervisor_log_dir(&self) -> PathBuf {
        self.root.join("logs").join(SUPERVISOR_DIR_NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_paths_are_disjoint_across_identities() {
        let root = WardenRoot::new("/srv/warden");
        let a_data = root.data_dir("alpha").expect("valid name");
        let b_data = root.data_dir("bravo").expect("valid name");
        let a_log = root.log_dir("alpha").expect("valid name");
        let b_log = root.log_dir("bravo").expect("valid name");
        let a_secrets = root.secrets_ciphertext_path("alpha").expect("valid name");
        let b_secrets = root.secrets_ciphertext_path("bravo").expect("valid name");

        assert_ne!(a_data, b_data);
        assert_ne!(a_log, b_log);
        assert_ne!(a_secrets, b_secrets);
        assert!(!a_data.starts_with(&b_data));
        assert!(!b_data.starts_with(&a_data));
    }

    #[test]
    fn rejects_traversal_in_any_identity_path() {
        let root = WardenRoot::new("/srv/warden");
        assert!(root.data_dir("../escape").is_err());
        assert!(root.log_dir("../escape").is_err());
        assert!(root.secrets_ciphertext_path("../escape").is_err());
    }
}
