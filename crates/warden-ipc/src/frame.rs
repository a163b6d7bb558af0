//! Newline-delimited JSON framing (spec.md §6 "IPC on-the-wire frame").
//!
//! Each [`crate::message::IpcMessage`] is one line of JSON. Over-size
//! lines are rejected without allocating a buffer past the size limit:
//! [`read_message`] reads byte-by-byte into a bounded buffer rather than
//! calling `read_line` against an unbounded `String`.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{IpcError, IpcResult};
use crate::message::IpcMessage;

/// Maximum frame size, in bytes, per spec.md §4.15 "Limits".
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Read one newline-delimited JSON frame from `reader`.
///
/// Returns `Ok(None)` on a clean EOF before any byte of a new frame was
/// read (the peer closed the connection between messages). Returns
/// [`IpcError::MessageTooLarge`] if the line exceeds [`MAX_FRAME_SIZE`]
/// before a newline is found.
///
/// # Errors
///
/// Propagates I/O errors and JSON decode errors.
pub async fn read_message<R: AsyncBufRead + Unpin>(reader: &mut R) -> IpcResult<Option<IpcMessage>> {
    let mut buf = Vec::new();
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return if buf.is_empty() {
                Ok(None)
            } else {
                Err(IpcError::Closed)
            };
        }

        if let Some(newline_at) = available.iter().position(|&b| b == b'\n') {
            buf.extend_from_slice(&available[..newline_at]);
            reader.consume(newline_at + 1);
            let message: IpcMessage = serde_json::from_slice(&buf)?;
            return Ok(Some(message));
        }

        let consumed = available.len();
        if buf.len() + consumed > MAX_FRAME_SIZE {
            reader.consume(consumed);
            return Err(IpcError::MessageTooLarge(MAX_FRAME_SIZE));
        }
        buf.extend_from_slice(available);
        reader.consume(consumed);
    }
}

/// Write one message as a single newline-terminated JSON line.
///
/// # Errors
///
/// Returns [`IpcError::MessageTooLarge`] if the encoded message exceeds
/// [`MAX_FRAME_SIZE`], or propagates I/O/serialization errors.
pub async fn write_message<W: AsyncWrite + Unpin>(writer: &mut W, message: &IpcMessage) -> IpcResult<()> {
    let mut encoded = serde_json::to_vec(message)?;
    if encoded.len() > MAX_FRAME_SIZE {
        return Err(IpcError::MessageTooLarge(MAX_FRAME_SIZE));
    }
    encoded.push(b'\n');
    writer.write_all(&encoded).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::IpcMessageKind;

    #[tokio::test]
    async fn writes_and_reads_back_one_message() {
        let message = IpcMessage::new(IpcMessageKind::StatusRequest, serde_json::json!({}), "alpha", "deadbeef");
        let mut buf = Vec::new();
        write_message(&mut buf, &message).await.expect("writes");

        let mut cursor = std::io::Cursor::new(buf);
        let decoded = read_message(&mut cursor).await.expect("reads").expect("some message");
        assert_eq!(decoded.sender, "alpha");
    }

    #[tokio::test]
    async fn reads_multiple_messages_from_one_stream() {
        let a = IpcMessage::new(IpcMessageKind::StatusRequest, serde_json::json!({}), "alpha", "t");
        let b = IpcMessage::new(IpcMessageKind::Shutdown, serde_json::json!({}), "bravo", "t");
        let mut buf = Vec::new();
        write_message(&mut buf, &a).await.expect("writes a");
        write_message(&mut buf, &b).await.expect("writes b");

        let mut cursor = std::io::Cursor::new(buf);
        let first = read_message(&mut cursor).await.expect("reads").expect("some message");
        let second = read_message(&mut cursor).await.expect("reads").expect("some message");
        assert_eq!(first.sender, "alpha");
        assert_eq!(second.sender, "bravo");
    }

    #[tokio::test]
    async fn clean_eof_before_any_frame_is_none() {
        let mut cursor = std::io::Cursor::new(Vec::new());
        let result = read_message(&mut cursor).await.expect("reads");
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn oversize_line_is_rejected() {
        let mut buf = vec![b'a'; MAX_FRAME_SIZE + 16];
        buf.push(b'\n');
        let mut cursor = std::io::Cursor::new(buf);
        let result = read_message(&mut cursor).await;
        assert!(matches!(result, Err(IpcError::MessageTooLarge(_))));
    }
}
