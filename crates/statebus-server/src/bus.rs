//! `StateBus`: the store, the subscription router and the broadcast
//! coordinator wired together.
//!
//! Every write, whether it arrives from a client or from backend code,
//! takes the same path: store commit, fan-out to every connection, then
//! local subscriber dispatch.
//!
//! # Commit gate
//!
//! A commit (store write plus fan-out enqueue) holds the read side of a
//! gate; attaching a new connection (registration plus snapshot) holds the
//! write side. A change is therefore either contained in a newcomer's
//! snapshot or enqueued to it after the snapshot, never lost and never
//! overtaken by an older snapshot value. Subscribers run after the gate is
//! released, so they may write to the bus themselves.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;
use statebus_core::{
    BusError, DispatchReport, ProtocolError, Result, Store, SubscriptionRouter, WireValue,
    decode_inbound,
};
use tracing::debug;

use crate::errors::TransportError;
use crate::websocket::broadcast::BroadcastManager;
use crate::websocket::connection::ClientConnection;

/// The state bus.
#[derive(Debug)]
pub struct StateBus {
    store: Store,
    router: SubscriptionRouter,
    broadcast: BroadcastManager,
    gate: RwLock<()>,
}

impl Default for StateBus {
    fn default() -> Self {
        Self::new(SubscriptionRouter::new())
    }
}

impl StateBus {
    /// Create a bus with an empty store and the given subscribers.
    pub fn new(router: SubscriptionRouter) -> Self {
        Self {
            store: Store::new(),
            router,
            broadcast: BroadcastManager::new(),
            gate: RwLock::new(()),
        }
    }

    /// Current raw value of an entry.
    pub fn get(&self, scope: &str, id: &str) -> Option<WireValue> {
        self.store.get(scope, id)
    }

    /// Current value of an entry decoded as `T`.
    ///
    /// `Ok(None)` if the entry was never set.
    pub fn get_as<T: DeserializeOwned>(&self, scope: &str, id: &str) -> Result<Option<T>> {
        self.store
            .get(scope, id)
            .map(|value| decode_entry(scope, id, &value))
            .transpose()
    }

    /// Store a value, broadcast it to every client and publish it to local
    /// subscribers.
    pub fn set(&self, scope: &str, id: &str, value: WireValue) -> DispatchReport {
        {
            let _commit = self.gate.read();
            self.store.set_with(scope, id, value.clone(), |stored| {
                let _ = self.broadcast.broadcast_change(scope, id, stored);
            });
        }
        self.router.publish(scope, id, &value)
    }

    /// Serialize `value` and [`set`](Self::set) it.
    pub fn set_as<T: Serialize + ?Sized>(
        &self,
        scope: &str,
        id: &str,
        value: &T,
    ) -> Result<DispatchReport> {
        let value = WireValue::encode(value).map_err(BusError::Encode)?;
        Ok(self.set(scope, id, value))
    }

    /// Atomically replace an existing entry with `updater(current)`, then
    /// broadcast and publish the result.
    ///
    /// The updater may run more than once under contention and must be
    /// pure. Fails with [`BusError::NotFound`] if the entry was never set.
    pub fn try_update<F>(&self, scope: &str, id: &str, updater: F) -> Result<WireValue>
    where
        F: FnMut(&WireValue) -> Result<WireValue>,
    {
        let next = {
            let _commit = self.gate.read();
            self.store.try_update_with(scope, id, updater, |stored| {
                let _ = self.broadcast.broadcast_change(scope, id, stored);
            })?
        };
        let _ = self.router.publish(scope, id, &next);
        Ok(next)
    }

    /// [`try_update`](Self::try_update) through a typed updater.
    ///
    /// The current value is decoded as `T` and the updater's result encoded
    /// back; a decode failure aborts the update with [`BusError::Decode`].
    pub fn try_update_as<T, F>(&self, scope: &str, id: &str, mut updater: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnMut(T) -> T,
    {
        let next = self.try_update(scope, id, |current| {
            let value = decode_entry::<T>(scope, id, current)?;
            WireValue::encode(&updater(value)).map_err(BusError::Encode)
        })?;
        decode_entry(scope, id, &next)
    }

    /// Apply one inbound client message.
    ///
    /// Malformed messages leave the store untouched and produce no
    /// broadcast; the caller drops them.
    pub fn ingest(&self, text: &str) -> std::result::Result<DispatchReport, ProtocolError> {
        let message = decode_inbound(text)?;
        debug!(scope = %message.scope, id = %message.id, "client write");
        Ok(self.set(&message.scope, &message.id, message.value))
    }

    /// Register a new connection and enqueue its snapshot.
    ///
    /// Returns the number of snapshot entries sent. The connection is not
    /// registered if its queue is already closed.
    pub fn connect(
        &self,
        connection: Arc<ClientConnection>,
    ) -> std::result::Result<usize, TransportError> {
        let _attach = self.gate.write();
        let entries = self.store.snapshot();
        let sent = self.broadcast.send_snapshot(&connection, &entries)?;
        self.broadcast.add(connection);
        Ok(sent)
    }

    /// Stop broadcasting to a connection.
    pub fn disconnect(&self, connection_id: &str) {
        if let Some(conn) = self.broadcast.remove(connection_id) {
            conn.close();
        }
    }

    /// Number of connected clients.
    pub fn connection_count(&self) -> usize {
        self.broadcast.connection_count()
    }

    /// Number of entries in the store.
    pub fn entry_count(&self) -> usize {
        self.store.len()
    }
}

fn decode_entry<T: DeserializeOwned>(scope: &str, id: &str, value: &WireValue) -> Result<T> {
    value.decode().map_err(|source| BusError::Decode {
        scope: scope.to_owned(),
        id: id.to_owned(),
        source,
    })
}
