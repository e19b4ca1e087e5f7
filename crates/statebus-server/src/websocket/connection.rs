//! Per-client connection handle.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::errors::TransportError;

/// One connected WebSocket client, as seen by the broadcast coordinator.
///
/// Owns no store state. Outbound messages go through an unbounded queue
/// drained by the connection's writer task; the queue is unbounded so a
/// snapshot of any size fits.
#[derive(Debug)]
pub struct ClientConnection {
    /// Unique connection id (`conn_<uuid v7>`).
    pub id: String,
    tx: mpsc::UnboundedSender<Arc<String>>,
    /// When the connection was accepted.
    pub connected_at: Instant,
    cancel: CancellationToken,
}

impl ClientConnection {
    /// Create a connection with a fresh id.
    pub fn new(tx: mpsc::UnboundedSender<Arc<String>>, cancel: CancellationToken) -> Self {
        Self {
            id: format!("conn_{}", Uuid::now_v7()),
            tx,
            connected_at: Instant::now(),
            cancel,
        }
    }

    /// Enqueue an encoded message for the writer task.
    pub fn send(&self, message: Arc<String>) -> Result<(), TransportError> {
        self.tx
            .send(message)
            .map_err(|_| TransportError::ConnectionClosed {
                conn_id: self.id.clone(),
            })
    }

    /// Signal the reader and writer tasks to stop.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    /// Whether [`close`](Self::close) was called or the server is stopping.
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}
