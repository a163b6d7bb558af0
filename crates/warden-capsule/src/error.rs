//! Plugin host error types.

use thiserror::Error;

/// Errors raised while loading or running plugins.
#[derive(Debug, Error)]
pub enum CapsuleError {
    /// The requested plugin name is not in the compile-time whitelist.
    #[error("`{0}` is not a registered plugin")]
    UnknownPlugin(String),

    /// A plugin name was registered twice.
    #[error("`{0}` is already registered")]
    DuplicatePlugin(String),

    /// `setup()` failed; the plugin is not loaded and its `tick()` will
    /// never be scheduled.
    #[error("plugin `{plugin}` failed to set up: {reason}")]
    SetupFailed {
        /// The plugin's whitelist name.
        plugin: String,
        /// What went wrong.
        reason: String,
    },

    /// Creating the plugin's isolated data or log directory failed.
    #[error("failed to create plugin directory for `{plugin}`: {source}")]
    Io {
        /// The plugin's whitelist name.
        plugin: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Result alias for plugin host operations.
pub type CapsuleResult<T> = Result<T, CapsuleError>;
