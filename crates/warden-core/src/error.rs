//! Shared error kinds for configuration and identity loading.

use thiserror::Error;

/// Errors produced while loading or validating an identity/persona
/// configuration (spec.md §7, kind `ConfigError`).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The YAML document could not be parsed.
    #[error("invalid YAML in {path}: {source}")]
    Yaml {
        /// Path of the offending file.
        path: String,
        /// Underlying parse error.
        #[source]
        source: serde_yaml::Error,
    },

    /// A required field was missing or empty.
    #[error("missing required field `{field}` in {path}")]
    MissingField {
        /// Path of the offending file.
        path: String,
        /// Field name.
        field: String,
    },

    /// The identity name failed the `^[a-z][a-z0-9_]*$` pattern.
    #[error("invalid identity name `{name}`: must match ^[a-z][a-z0-9_]*$")]
    InvalidIdentityName {
        /// The rejected name.
        name: String,
    },

    /// A connector or capability name was not present in the plugin
    /// whitelist.
    #[error("`{kind}` `{name}` is not in the plugin whitelist")]
    UnknownPlugin {
        /// "connector" or "capability".
        kind: &'static str,
        /// The offending name.
        name: String,
    },

    /// Generic I/O failure while reading a config file.
    #[error("I/O error reading {path}: {source}")]
    Io {
        /// Path of the offending file.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Result alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
