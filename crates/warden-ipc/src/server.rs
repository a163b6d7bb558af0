//! The IPC server (spec.md §4.15), generalized from the donor's
//! `astrid-kernel::socket::spawn_socket_server` broadcast loop into a
//! request/reply server: one framed JSON request in, one framed JSON
//! reply out, over an authenticated, owner-only Unix domain socket.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use tokio::net::{UnixListener, UnixStream};
use tracing::{error, info, warn};

use warden_events::EventBus;
use warden_ratelimit::{RateLimiter, RateLimiterConfig};

use crate::auth::AuthToken;
use crate::error::{IpcError, IpcResult};
use crate::frame::{read_message, write_message};
use crate::message::IpcMessage;

/// Per-sender rate limit, per spec.md §4.15 "≈100 messages / minute".
const RATE_LIMIT_MAX_TOKENS: f64 = 100.0;
const RATE_LIMIT_REFILL_PER_SEC: f64 = 100.0 / 60.0;
/// Per-sender table size, per spec.md §4.15 "LRU-bounded (≈2 000 entries)".
const RATE_LIMIT_MAX_SENDERS: usize = 2000;

/// Server-side per-request timeout, per spec.md §5 "Timeouts".
const SERVER_REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Future returned by a [`RequestHandler`].
pub type HandlerFuture = Pin<Box<dyn Future<Output = IpcMessage> + Send>>;

/// Handles one decoded, authenticated [`IpcMessage`] and produces the
/// reply to send back. Blanket-implemented for any `Fn(IpcMessage) ->
/// impl Future<Output = IpcMessage>`, mirroring `warden-events::EventHandler`.
pub trait RequestHandler: Send + Sync {
    /// Produce the reply for `message`.
    fn handle(&self, message: IpcMessage) -> HandlerFuture;
}

impl<F, Fut> RequestHandler for F
where
    F: Fn(IpcMessage) -> Fut + Send + Sync,
    Fut: Future<Output = IpcMessage> + Send + 'static,
{
    fn handle(&self, message: IpcMessage) -> HandlerFuture {
        Box::pin(self(message))
    }
}

/// Authenticated local-socket IPC server.
pub struct IpcServer {
    socket_path: PathBuf,
    token: Arc<AuthToken>,
    limiter: Arc<RateLimiter>,
    events: Option<Arc<EventBus>>,
}

impl IpcServer {
    /// Build a server bound to `socket_path`, authenticating against
    /// `token`.
    #[must_use]
    pub fn new(socket_path: impl Into<PathBuf>, token: AuthToken) -> Self {
        Self {
            socket_path: socket_path.into(),
            token: Arc::new(token),
            limiter: Arc::new(RateLimiter::new(RateLimiterConfig {
                max_tokens: RATE_LIMIT_MAX_TOKENS,
                refill_rate: RATE_LIMIT_REFILL_PER_SEC,
                max_buckets: RATE_LIMIT_MAX_SENDERS,
            })),
            events: None,
        }
    }

    /// Emit `ipc.*` events (auth failures, rate-limit rejections) onto
    /// this bus as they occur.
    #[must_use]
    pub fn with_event_bus(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    /// Bind the socket (removing any stale file first, then restricting
    /// permissions to owner-only) and serve requests with `handler` until
    /// an I/O error occurs on the listener itself.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be bound or its permissions
    /// cannot be restricted.
    pub async fn serve(self, handler: Arc<dyn RequestHandler>) -> IpcResult<()> {
        let listener = Self::bind(&self.socket_path)?;
        info!(path = %self.socket_path.display(), "IPC server listening");

        loop {
            let (stream, _addr) = listener.accept().await?;
            let token = Arc::clone(&self.token);
            let limiter = Arc::clone(&self.limiter);
            let events = self.events.clone();
            let handler = Arc::clone(&handler);
            tokio::spawn(async move {
                if let Err(err) = handle_connection(stream, &token, &limiter, events.as_ref(), handler.as_ref()).await {
                    warn!(error = %err, "IPC connection ended with an error");
                }
            });
        }
    }

    fn bind(path: &Path) -> IpcResult<UnixListener> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let listener = UnixListener::bind(path)?;
        Self::restrict_permissions(path)?;
        Ok(listener)
    }

    #[cfg(unix)]
    fn restrict_permissions(path: &Path) -> std::io::Result<()> {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
    }

    #[cfg(not(unix))]
    fn restrict_permissions(_path: &Path) -> std::io::Result<()> {
        Ok(())
    }
}

async fn handle_connection(
    stream: UnixStream,
    token: &AuthToken,
    limiter: &RateLimiter,
    events: Option<&Arc<EventBus>>,
    handler: &dyn RequestHandler,
) -> IpcResult<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = tokio::io::BufReader::new(read_half);

    loop {
        let message = match read_message(&mut reader).await {
            Ok(Some(message)) => message,
            Ok(None) => return Ok(()),
            Err(err) => return Err(err),
        };

        if !token.verify_hex(&message.auth_token) {
            warn!(sender = %message.sender, "IPC auth failure");
            if let Some(bus) = events {
                bus.emit("ipc.auth_failure", serde_json::json!({"sender": message.sender})).await;
            }
            return Err(IpcError::AuthFailure);
        }

        if !limiter.allow(&message.sender) {
            warn!(sender = %message.sender, "IPC sender rate-limited");
            if let Some(bus) = events {
                bus.emit("ipc.rate_limited", serde_json::json!({"sender": message.sender})).await;
            }
            continue;
        }

        let reply = match tokio::time::timeout(SERVER_REQUEST_TIMEOUT, handler.handle(message.clone())).await {
            Ok(reply) => reply,
            Err(_) => {
                error!(sender = %message.sender, "IPC request handler timed out");
                message.reply(
                    message.kind,
                    serde_json::json!({"error": "timeout"}),
                    "supervisor",
                    token.to_hex(),
                )
            }
        };

        write_message(&mut write_half, &reply).await?;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::client::IpcClient;
    use crate::message::IpcMessageKind;

    #[tokio::test]
    async fn round_trips_a_request_through_a_real_socket() {
        let dir = tempfile::tempdir().expect("tempdir");
        let socket_path = dir.path().join("warden-test.sock");
        let token = AuthToken::generate();
        let token_hex = token.to_hex();

        let server = IpcServer::new(&socket_path, token);
        let handler: Arc<dyn RequestHandler> = Arc::new(|message: IpcMessage| {
            Box::pin(async move {
                message.reply(
                    IpcMessageKind::StatusResponse,
                    serde_json::json!({"ok": true}),
                    "supervisor",
                    message.auth_token.clone(),
                )
            }) as HandlerFuture
        });

        tokio::spawn(async move {
            let _ = server.serve(handler).await;
        });

        // Give the listener a moment to bind.
        tokio::time::sleep(Duration::from_millis(50)).await;

        let mut client = IpcClient::connect(&socket_path).await.expect("connects");
        let request = IpcMessage::new(IpcMessageKind::StatusRequest, serde_json::json!({}), "alpha", token_hex);
        let response = client.send_request(request).await.expect("gets a reply");
        assert_eq!(response.kind, IpcMessageKind::StatusResponse);
    }

    #[tokio::test]
    async fn rejects_a_bad_auth_token() {
        let dir = tempfile::tempdir().expect("tempdir");
        let socket_path = dir.path().join("warden-test-auth.sock");
        let server = IpcServer::new(&socket_path, AuthToken::generate());
        let handler: Arc<dyn RequestHandler> = Arc::new(|message: IpcMessage| {
            Box::pin(async move { message.reply(IpcMessageKind::StatusResponse, serde_json::json!({}), "supervisor", "x") })
                as HandlerFuture
        });

        tokio::spawn(async move {
            let _ = server.serve(handler).await;
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        let mut client = IpcClient::connect(&socket_path).await.expect("connects");
        let request = IpcMessage::new(IpcMessageKind::StatusRequest, serde_json::json!({}), "alpha", "0000");
        let result = client.send_request(request).await;
        assert!(result.is_err());
    }
}
