//! IPC client (spec.md §4.15): "Clients open a connection, send a framed
//! JSON message, read a framed JSON reply."

use std::path::Path;

use tokio::io::BufReader;
use tokio::net::UnixStream;

use crate::error::IpcResult;
use crate::frame::{read_message, write_message};
use crate::message::IpcMessage;

/// A connected IPC client. One connection is good for any number of
/// sequential request/reply round-trips.
pub struct IpcClient {
    reader: BufReader<tokio::net::unix::OwnedReadHalf>,
    writer: tokio::net::unix::OwnedWriteHalf,
}

impl IpcClient {
    /// Connect to the server listening at `socket_path`.
    ///
    /// # Errors
    ///
    /// Propagates the underlying I/O error if the socket cannot be opened.
    pub async fn connect(socket_path: impl AsRef<Path>) -> IpcResult<Self> {
        let stream = UnixStream::connect(socket_path.as_ref()).await?;
        let (read_half, write_half) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(read_half),
            writer: write_half,
        })
    }

    /// Send `request` and wait for the matching reply.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::IpcError::Closed`] if the server closes the
    /// connection before replying, or propagates I/O/serialization errors.
    pub async fn send_request(&mut self, request: IpcMessage) -> IpcResult<IpcMessage> {
        write_message(&mut self.writer, &request).await?;
        match read_message(&mut self.reader).await? {
            Some(reply) => Ok(reply),
            None => Err(crate::error::IpcError::Closed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthToken;
    use crate::message::IpcMessageKind;
    use crate::server::{HandlerFuture, IpcServer, RequestHandler};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn client_round_trips_two_sequential_requests() {
        let dir = tempfile::tempdir().expect("tempdir");
        let socket_path = dir.path().join("warden-client-test.sock");
        let token = AuthToken::generate();
        let token_hex = token.to_hex();

        let server = IpcServer::new(&socket_path, token);
        let handler: Arc<dyn RequestHandler> = Arc::new(|message: IpcMessage| {
            Box::pin(async move {
                message.reply(IpcMessageKind::StatusResponse, serde_json::json!({"ok": true}), "supervisor", message.auth_token.clone())
            }) as HandlerFuture
        });
        tokio::spawn(async move {
            let _ = server.serve(handler).await;
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        let mut client = IpcClient::connect(&socket_path).await.expect("connects");
        for _ in 0..2 {
            let request = IpcMessage::new(IpcMessageKind::StatusRequest, serde_json::json!({}), "alpha", token_hex.clone());
            let response = client.send_request(request).await.expect("gets a reply");
            assert_eq!(response.kind, IpcMessageKind::StatusResponse);
        }
    }
}
