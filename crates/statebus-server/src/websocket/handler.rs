//! WebSocket upgrade and per-connection reader/writer loops.
//!
//! Each connection runs two tasks: this handler reads frames and feeds text
//! into the bus, and a spawned writer drains the connection's outbound
//! queue and sends keepalive pings. Either side ending cancels the
//! connection token, which stops the other. The connection is detached from
//! the bus when the handler returns or unwinds.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{Span, debug, info, instrument, trace, warn};

use super::connection::ClientConnection;
use crate::bus::StateBus;
use crate::server::AppState;

/// Detaches a connection from the bus on drop, including during a panic.
struct Teardown {
    bus: Arc<StateBus>,
    conn: Arc<ClientConnection>,
}

impl Drop for Teardown {
    fn drop(&mut self) {
        // Also cancels the connection token, which stops the writer.
        self.bus.disconnect(&self.conn.id);
        info!(
            age_ms = u64::try_from(self.conn.age().as_millis()).unwrap_or(u64::MAX),
            "client disconnected"
        );
    }
}

/// GET `<ws_path>`: upgrade to a WebSocket bound to the bus.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.max_message_size(state.config.max_message_size)
        .on_upgrade(move |socket| handle_socket(socket, state))
}

/// Drive one client connection until either side closes it.
#[instrument(skip_all, fields(conn_id))]
pub async fn handle_socket(socket: WebSocket, state: AppState) {
    let (tx, rx) = mpsc::unbounded_channel();
    let cancel = state.shutdown.connection_token();
    let conn = Arc::new(ClientConnection::new(tx, cancel.clone()));
    let _ = Span::current().record("conn_id", conn.id.as_str());

    // Snapshot is queued before the writer starts; nothing is lost.
    match state.bus.connect(Arc::clone(&conn)) {
        Ok(entries) => info!(entries, "client connected"),
        Err(e) => {
            warn!(error = %e, "failed to attach client");
            return;
        }
    }

    let _teardown = Teardown {
        bus: Arc::clone(&state.bus),
        conn: Arc::clone(&conn),
    };

    let (sink, mut stream) = socket.split();
    state.shutdown.spawn_connection_task(write_loop(
        sink,
        rx,
        cancel.clone(),
        state.config.heartbeat_interval,
    ));

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    if let Err(e) = state.bus.ingest(text.as_str()) {
                        debug!(error = %e, "dropped inbound message");
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                // Binary is not part of the protocol; ping/pong are answered
                // by the transport.
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(error = %e, "websocket read failed");
                    break;
                }
            },
        }
    }
}

/// Floor for the ping interval; `tokio::time::interval` rejects zero.
const MIN_HEARTBEAT: Duration = Duration::from_millis(100);

async fn write_loop(
    mut sink: SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<Arc<String>>,
    cancel: CancellationToken,
    heartbeat: Duration,
) {
    let mut ping = tokio::time::interval(heartbeat.max(MIN_HEARTBEAT));
    // First tick completes immediately.
    let _ = ping.tick().await;

    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
            msg = rx.recv() => match msg {
                Some(text) => {
                    if sink.send(Message::Text(text.as_str().to_owned().into())).await.is_err() {
                        break;
                    }
                }
                None => break,
            },
            _ = ping.tick() => {
                if sink.send(Message::Ping(Bytes::new())).await.is_err() {
                    break;
                }
                trace!("sent ping");
            }
        }
    }

    cancel.cancel();
}
