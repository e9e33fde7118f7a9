//! Message transport seam between a session and its client connection.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::StreamingError;

/// Bidirectional, message-oriented connection to one client.
///
/// Inbound messages only act as "send the next batch" triggers; their
/// content is not interpreted.
#[async_trait]
pub trait FrameTransport: Send {
    /// Waits for the next inbound message.
    ///
    /// Returns `Ok(None)` once the client has closed the connection.
    ///
    /// # Errors
    /// - `StreamingError::Transport` - The connection failed while reading
    async fn read_message(&mut self) -> Result<Option<Vec<u8>>, StreamingError>;

    /// Sends one text message.
    ///
    /// # Errors
    /// - `StreamingError::Transport` - The connection failed while writing
    async fn write_message(&mut self, message: String) -> Result<(), StreamingError>;

    /// Releases the connection. Called once when a session ends.
    ///
    /// # Errors
    /// - `StreamingError::Transport` - The close handshake failed
    async fn close(&mut self) -> Result<(), StreamingError> {
        Ok(())
    }
}

/// In-process transport backed by channels, paired with a [`MemoryClient`].
#[derive(Debug)]
pub struct MemoryTransport {
    inbound: mpsc::UnboundedReceiver<Result<Vec<u8>, String>>,
    outbound: mpsc::UnboundedSender<String>,
    closed: Arc<AtomicBool>,
}

/// Client side of a [`MemoryTransport`].
#[derive(Debug)]
pub struct MemoryClient {
    uplink: Option<mpsc::UnboundedSender<Result<Vec<u8>, String>>>,
    downlink: Option<mpsc::UnboundedReceiver<String>>,
    closed: Arc<AtomicBool>,
}

impl MemoryTransport {
    /// Creates a connected transport/client pair.
    pub fn pair() -> (MemoryTransport, MemoryClient) {
        let (uplink, inbound) = mpsc::unbounded_channel();
        let (outbound, downlink) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));
        (
            MemoryTransport {
                inbound,
                outbound,
                closed: Arc::clone(&closed),
            },
            MemoryClient {
                uplink: Some(uplink),
                downlink: Some(downlink),
                closed,
            },
        )
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

#[async_trait]
impl FrameTransport for MemoryTransport {
    async fn read_message(&mut self) -> Result<Option<Vec<u8>>, StreamingError> {
        match self.inbound.recv().await {
            Some(Ok(message)) => Ok(Some(message)),
            Some(Err(reason)) => Err(StreamingError::Transport { reason }),
            None => Ok(None),
        }
    }

    async fn write_message(&mut self, message: String) -> Result<(), StreamingError> {
        self.outbound
            .send(message)
            .map_err(|_| StreamingError::Transport {
                reason: "client stopped receiving".to_string(),
            })
    }

    async fn close(&mut self) -> Result<(), StreamingError> {
        self.closed.store(true, Ordering::Release);
        self.inbound.close();
        Ok(())
    }
}

impl MemoryClient {
    /// Sends a trigger message. Returns false once the session stopped reading.
    pub fn ping(&self) -> bool {
        self.uplink
            .as_ref()
            .is_some_and(|uplink| uplink.send(Ok(b"next".to_vec())).is_ok())
    }

    /// Makes the session's next read fail with `reason`.
    pub fn inject_read_error(&self, reason: &str) {
        if let Some(uplink) = &self.uplink {
            let _ = uplink.send(Err(reason.to_string()));
        }
    }

    /// Closes the client-to-server direction, as a graceful disconnect.
    pub fn disconnect(&mut self) {
        self.uplink = None;
    }

    /// Stops accepting server messages, so the next write fails.
    pub fn drop_downlink(&mut self) {
        self.downlink = None;
    }

    /// True once the server side called [`FrameTransport::close`].
    pub fn saw_close(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Waits for the next batch message; `None` once the session has ended.
    pub async fn next_message(&mut self) -> Option<String> {
        self.downlink.as_mut()?.recv().await
    }

    /// Drains every message already delivered.
    pub fn received(&mut self) -> Vec<String> {
        let mut messages = Vec::new();
        if let Some(downlink) = self.downlink.as_mut() {
            while let Ok(message) = downlink.try_recv() {
                messages.push(message);
            }
        }
        messages
    }
}
