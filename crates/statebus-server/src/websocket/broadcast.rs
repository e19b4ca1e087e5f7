//! Change fan-out and snapshot delivery.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use statebus_core::{Entry, WireValue, encode_change};
use tracing::{debug, warn};

use super::connection::ClientConnection;
use crate::errors::TransportError;

/// Tracks connected clients and delivers encoded changes to them.
///
/// Every method is synchronous: enqueuing never waits on a socket, so the
/// bus can call these while holding its commit gate.
#[derive(Debug, Default)]
pub struct BroadcastManager {
    connections: RwLock<HashMap<String, Arc<ClientConnection>>>,
}

impl BroadcastManager {
    /// Create an empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection for fan-out.
    pub fn add(&self, connection: Arc<ClientConnection>) {
        let _ = self
            .connections
            .write()
            .insert(connection.id.clone(), connection);
    }

    /// Remove a connection. Returns it if it was registered.
    pub fn remove(&self, connection_id: &str) -> Option<Arc<ClientConnection>> {
        self.connections.write().remove(connection_id)
    }

    /// Encode a change once and enqueue it to every connection, including
    /// the one that originated it.
    ///
    /// A connection whose queue is closed is removed and cancelled; the rest
    /// still receive the change. Returns the number of successful enqueues.
    pub fn broadcast_change(&self, scope: &str, id: &str, value: &WireValue) -> usize {
        let message = match encode_change(scope, id, value) {
            Ok(json) => Arc::new(json),
            Err(e) => {
                warn!(scope, id, error = %e, "failed to encode change");
                return 0;
            }
        };

        let mut failed = Vec::new();
        let delivered = {
            let conns = self.connections.read();
            let mut delivered = 0;
            for conn in conns.values() {
                match conn.send(Arc::clone(&message)) {
                    Ok(()) => delivered += 1,
                    Err(e) => {
                        warn!(conn_id = %conn.id, error = %e, "dropping client after failed send");
                        failed.push(conn.id.clone());
                    }
                }
            }
            delivered
        };
        debug!(scope, id, recipients = delivered, "broadcast change");

        for conn_id in failed {
            if let Some(conn) = self.remove(&conn_id) {
                conn.close();
            }
        }
        delivered
    }

    /// Enqueue every snapshot entry to one connection, in order.
    ///
    /// Stops at the first failed enqueue; the caller decides whether to
    /// register the connection at all.
    pub fn send_snapshot(
        &self,
        connection: &ClientConnection,
        entries: &[Entry],
    ) -> Result<usize, TransportError> {
        let mut sent = 0;
        for entry in entries {
            match encode_change(&entry.scope, &entry.id, &entry.value) {
                Ok(json) => {
                    connection.send(Arc::new(json))?;
                    sent += 1;
                }
                Err(e) => {
                    warn!(scope = %entry.scope, id = %entry.id, error = %e, "failed to encode snapshot entry");
                }
            }
        }
        debug!(conn_id = %connection.id, entries = sent, "sent snapshot");
        Ok(sent)
    }

    /// Number of registered connections.
    pub fn connection_count(&self) -> usize {
        self.connections.read().len()
    }
}
