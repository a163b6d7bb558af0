//! Secrets store error types.

use thiserror::Error;

/// Errors from secrets store operations.
#[derive(Debug, Error)]
pub enum SecretsError {
    /// The requested key was not present in the store.
    #[error("secret not found: {0}")]
    NotFound(String),

    /// The ciphertext failed to decrypt (wrong master key, or tampering).
    #[error("failed to decrypt secrets store: {0}")]
    DecryptionFailed(#[from] warden_crypto::CryptoError),

    /// Master key acquisition failed (no keychain, no readable file, and
    /// no permission to create one).
    #[error("could not acquire master key: {0}")]
    MasterKeyUnavailable(String),

    /// The metadata file was present but malformed.
    #[error("invalid secrets metadata: {0}")]
    InvalidMetadata(String),

    /// Underlying storage I/O failed.
    #[error("storage error: {0}")]
    Storage(#[from] warden_storage::StorageError),

    /// I/O error reading or writing store files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization of the decrypted key/value map failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for secrets store operations.
pub type SecretsResult<T> = Result<T, SecretsError>;
