//! Supervisor error kind.

use thiserror::Error;

/// Errors raised while starting, running, or tearing down a
/// [`crate::Supervisor`].
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// The global configuration document could not be loaded.
    #[error("config error: {0}")]
    Config(#[from] warden_core::ConfigError),

    /// Opening the supervisor's own audit store failed.
    #[error("audit error: {0}")]
    Audit(#[from] warden_audit::AuditError),

    /// The supervisor's signing key could not be loaded or generated.
    #[error("crypto error: {0}")]
    Crypto(#[from] warden_crypto::CryptoError),

    /// The IPC server could not bind its socket or load its auth token.
    #[error("IPC error: {0}")]
    Ipc(#[from] warden_ipc::IpcError),

    /// No identity was named on the command line.
    #[error("at least one identity must be supervised")]
    NoIdentities,

    /// `current_exe()` could not be resolved, so no child can be spawned.
    #[error("could not resolve the path to the running executable: {0}")]
    CurrentExe(std::io::Error),

    /// A filesystem operation (scaffolding directories) failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// The path the operation was acting on.
        path: String,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// Result alias for supervisor operations.
pub type SupervisorResult<T> = Result<T, SupervisorError>;
