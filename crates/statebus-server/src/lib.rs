//! # statebus-server
//!
//! WebSocket transport for the state bus.
//!
//! - [`StateBus`] ties the store, the subscription router and the broadcast
//!   coordinator together; it is also the in-process write API
//! - [`BusServer`] serves `/health` and the WebSocket endpoint with Axum
//! - Each client gets a snapshot on connect, then every change, including
//!   its own writes
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod bus;
pub mod config;
pub mod errors;
pub mod health;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use bus::StateBus;
pub use config::ServerConfig;
pub use errors::{ServerError, TransportError};
pub use server::BusServer;
