//! Authenticated local-socket IPC channel (spec.md §4.15, §6).
//!
//! Newline-delimited JSON frames over a Unix domain socket, owner-only
//! permissions, constant-time auth token verification, and a per-sender
//! sliding-window rate limit. Generalized from the donor's
//! `astrid-kernel::socket` broadcast loop into a request/reply channel.

pub mod auth;
pub mod client;
pub mod error;
pub mod frame;
pub mod message;
pub mod server;

pub use auth::AuthToken;
pub use client::IpcClient;
pub use error::{IpcError, IpcResult};
pub use message::{
    IpcMessage, IpcMessageKind, PermissionRequestPayload, PermissionResponsePayload,
    ShutdownPayload, StatusRequestPayload, StatusResponsePayload,
};
pub use server::{HandlerFuture, IpcServer, RequestHandler};

/// Common imports for crates that speak the IPC protocol.
pub mod prelude {
    pub use crate::{
        AuthToken, HandlerFuture, IpcClient, IpcError, IpcMessage, IpcMessageKind, IpcResult,
        IpcServer, PermissionRequestPayload, PermissionResponsePayload, RequestHandler,
        ShutdownPayload, StatusRequestPayload, StatusResponsePayload,
    };
}
