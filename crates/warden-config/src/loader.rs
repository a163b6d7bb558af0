//! Layered identity loading (spec.md §6, §7).
//!
//! 1. Parse the global `{framework_name}.yaml` file, if present; an empty
//!    mapping otherwise.
//! 2. Parse the per-identity YAML file. Must exist.
//! 3. Deep-merge the identity document over the global document
//!    ([`crate::merge::deep_merge`]) so per-identity keys win.
//! 4. Expand `${VAR}` / `${VAR:-default}` references in every string
//!    scalar against the process environment.
//! 5. Deserialize the merged tree into [`warden_core::Identity`], which
//!    validates the identity name and required fields on construction.

use std::path::Path;

use serde_yaml::Value;
use tracing::debug;
use warden_core::dirs::WardenRoot;
use warden_core::{ConfigError, ConfigResult, Identity};

use crate::env::{expand_env, from_process_env};
use crate::global::GlobalConfig;
use crate::merge::deep_merge;

fn read_yaml_file(path: &Path) -> ConfigResult<Option<Value>> {
    match std::fs::read_to_string(path) {
        Ok(contents) => {
            let value: Value = serde_yaml::from_str(&contents).map_err(|source| ConfigError::Yaml {
                path: path.display().to_string(),
                source,
            })?;
            Ok(Some(value))
        }
        Err(source) if source.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(ConfigError::Io {
            path: path.display().to_string(),
            source,
        }),
    }
}

/// Parse `{root}/config/{framework_name}.yaml`, defaulting to an empty
/// document when the file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Yaml`] if the file exists but is malformed, or
/// [`ConfigError::Io`] on any other read failure.
pub fn load_global(root: &WardenRoot) -> ConfigResult<GlobalConfig> {
    let path = root.global_config_path();
    match read_yaml_file(&path)? {
        Some(value) => serde_yaml::from_value(value).map_err(|source| ConfigError::Yaml {
            path: path.display().to_string(),
            source,
        }),
        None => Ok(GlobalConfig::default()),
    }
}

/// Load one identity: global defaults merged under its per-identity
/// document, with environment expansion applied.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidIdentityName`] if `name` is not
/// directory-safe, [`ConfigError::Io`] if the identity file is missing or
/// unreadable, [`ConfigError::Yaml`] if either document is malformed, and
/// [`ConfigError::MissingField`] if required fields are absent after
/// merging.
pub fn load_identity(root: &WardenRoot, name: &str) -> ConfigResult<Identity> {
    let identity_path = root.identity_config_path(name)?;
    let global_path = root.global_config_path();

    let mut merged = read_yaml_file(&global_path)?.unwrap_or(Value::Mapping(Default::default()));
    let identity_doc = read_yaml_file(&identity_path)?.ok_or_else(|| ConfigError::Io {
        path: identity_path.display().to_string(),
        source: std::io::Error::new(std::io::ErrorKind::NotFound, "identity file not found"),
    })?;

    deep_merge(&mut merged, &identity_doc);
    expand_env(&mut merged, &from_process_env);

    debug!(identity = name, "loaded merged identity document");

    let rendered = serde_yaml::to_string(&merged).map_err(|source| ConfigError::Yaml {
        path: identity_path.display().to_string(),
        source,
    })?;
    Identity::from_yaml(&identity_path.display().to_string(), &rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(root: &WardenRoot, rel: &str, contents: &str) {
        let path = root.path().join(rel);
        fs::create_dir_all(path.parent().expect("has parent")).expect("mkdir");
        fs::write(path, contents).expect("write");
    }

    #[test]
    fn identity_alone_loads_without_global_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = WardenRoot::new(dir.path());
        write(
            &root,
            "config/identities/luma.yaml",
            "name: luma\ndisplay_name: Luma\nllm:\n  provider: hosted\n  model: claude\n",
        );

        let identity = load_identity(&root, "luma").expect("loads");
        assert_eq!(identity.name, "luma");
        assert_eq!(identity.llm.model, "claude");
    }

    #[test]
    fn global_defaults_are_inherited_and_overridden() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = WardenRoot::new(dir.path());
        write(
            &root,
            "config/warden.yaml",
            "security:\n  enable_preflight: false\n  block_threshold: 0.5\n",
        );
        write(
            &root,
            "config/identities/luma.yaml",
            "name: luma\ndisplay_name: Luma\nllm:\n  provider: hosted\n  model: claude\nsecurity:\n  block_threshold: 0.9\n",
        );

        let identity = load_identity(&root, "luma").expect("loads");
        assert!(!identity.security.enable_preflight);
        assert!((identity.security.block_threshold - 0.9).abs() < f64::EPSILON);
    }

    #[test]
    fn missing_identity_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = WardenRoot::new(dir.path());
        let err = load_identity(&root, "ghost").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn env_vars_expand_in_identity_document() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = WardenRoot::new(dir.path());
        write(
            &root,
            "config/identities/luma.yaml",
            "name: luma\ndisplay_name: Luma\nllm:\n  provider: hosted\n  model: ${WARDEN_TEST_MODEL:-claude-default}\n",
        );

        let identity = load_identity(&root, "luma").expect("loads");
        assert_eq!(identity.llm.model, "claude-default");
    }

    #[test]
    fn load_global_defaults_when_file_absent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = WardenRoot::new(dir.path());
        let global = load_global(&root).expect("loads");
        assert_eq!(global.log_filter, "warden=info");
    }
}
