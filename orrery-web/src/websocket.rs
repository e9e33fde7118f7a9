//! axum WebSocket adapter for the session transport.

use async_trait::async_trait;
use axum::extract::ws::{CloseFrame, Message, Utf8Bytes, WebSocket, close_code};
use orrery_core::{FrameTransport, StreamingError};

/// A WebSocket connection carrying frame batches as text messages.
pub struct WebSocketTransport {
    socket: WebSocket,
    peer_closed: bool,
}

impl WebSocketTransport {
    /// Wraps an upgraded socket.
    pub fn new(socket: WebSocket) -> Self {
        Self {
            socket,
            peer_closed: false,
        }
    }
}

fn transport_error(err: axum::Error) -> StreamingError {
    StreamingError::Transport {
        reason: err.to_string(),
    }
}

#[async_trait]
impl FrameTransport for WebSocketTransport {
    async fn read_message(&mut self) -> Result<Option<Vec<u8>>, StreamingError> {
        loop {
            match self.socket.recv().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(text.as_str().as_bytes().to_vec())),
                Some(Ok(Message::Binary(bytes))) => return Ok(Some(bytes.to_vec())),
                // Control frames are answered by the protocol layer
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
                Some(Ok(Message::Close(_))) | None => {
                    self.peer_closed = true;
                    return Ok(None);
                }
                Some(Err(err)) => return Err(transport_error(err)),
            }
        }
    }

    async fn write_message(&mut self, message: String) -> Result<(), StreamingError> {
        self.socket
            .send(Message::Text(message.into()))
            .await
            .map_err(transport_error)
    }

    async fn close(&mut self) -> Result<(), StreamingError> {
        if self.peer_closed {
            return Ok(());
        }
        self.socket
            .send(Message::Close(Some(CloseFrame {
                code: close_code::NORMAL,
                reason: Utf8Bytes::from_static("session closed"),
            })))
            .await
            .map_err(transport_error)
    }
}
