//! LLM-related error types.

use thiserror::Error;

/// Errors raised by LLM backend clients, the registry, or the router.
#[derive(Debug, Error)]
pub enum LlmError {
    /// The request to the backend failed at the transport level (spec.md
    /// §7 `BackendError`).
    #[error("backend request failed: {0}")]
    RequestFailed(String),

    /// The backend returned a non-success HTTP status.
    #[error("backend returned status {status}: {body}")]
    BadStatus {
        /// HTTP status code.
        status: u16,
        /// Response body, truncated.
        body: String,
    },

    /// The backend's response body could not be parsed as expected.
    #[error("invalid backend response: {0}")]
    InvalidResponse(String),

    /// The call exceeded its configured timeout.
    #[error("backend call timed out after {0}s")]
    Timeout(u64),

    /// A backend was registered (or resolved) with a URL whose scheme is
    /// not `http://` or `https://` (spec.md §4.12).
    #[error("invalid backend URL scheme in `{0}`: only http:// and https:// are accepted")]
    InvalidUrlScheme(String),

    /// `resolve_backend` was given an explicit override that names no
    /// registered backend.
    #[error("no backend registered with name `{0}`")]
    UnknownBackend(String),

    /// No backend at all is registered, or none satisfy the requested
    /// routing constraints.
    #[error("no backend available to satisfy the request")]
    NoBackendAvailable,
}

/// Result alias for LLM operations.
pub type LlmResult<T> = Result<T, LlmError>;
