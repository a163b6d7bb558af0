//! IPC error types (spec.md §7 `IPCAuthFailure` and related dispositions).

use thiserror::Error;

/// Errors raised while framing, authenticating, or exchanging IPC messages.
#[derive(Debug, Error)]
pub enum IpcError {
    /// The peer's auth token did not match, or no token was presented.
    /// Per spec.md §7, the connection is closed immediately on this error.
    #[error("IPC authentication failed")]
    AuthFailure,

    /// A frame exceeded [`crate::frame::MAX_FRAME_SIZE`] before it was
    /// fully parsed; rejected without allocating the oversize buffer.
    #[error("IPC message exceeds the {0}-byte size limit")]
    MessageTooLarge(usize),

    /// The sender has exceeded its sliding-window rate limit.
    #[error("sender `{0}` is rate-limited")]
    RateLimited(String),

    /// The server did not produce a reply within the per-request timeout.
    #[error("IPC request timed out")]
    Timeout,

    /// The peer closed the connection, or EOF was reached mid-frame.
    #[error("IPC connection closed")]
    Closed,

    /// Underlying I/O failure.
    #[error("IPC I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A frame was not valid JSON, or didn't decode as an [`crate::message::IpcMessage`].
    #[error("IPC message serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result alias for IPC operations.
pub type IpcResult<T> = Result<T, IpcError>;
