//! WebSocket connection management, fan-out, and per-connection loops.

pub mod broadcast;
pub mod connection;
pub mod handler;
