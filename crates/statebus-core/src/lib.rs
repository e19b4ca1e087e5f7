//! # statebus-core
//!
//! Transport-agnostic core of the state synchronization bus.
//!
//! - **Wire values**: [`WireValue`] keeps every stored value as raw JSON text,
//!   decoded lazily by whoever reads it
//! - **Store**: [`Store`] maps `(scope, id)` to a [`WireValue`] with atomic
//!   compare-and-swap updates and per-entry consistent snapshots
//! - **Protocol**: [`protocol`] parses inbound `{scope, id, value}` messages and
//!   encodes outbound change notifications
//! - **Router**: [`SubscriptionRouter`] dispatches changes to exact-id and
//!   regex-pattern subscribers, raw or type-decoded
//! - **Errors**: [`BusError`], [`ProtocolError`], [`DecodeError`] via `thiserror`

#![deny(unsafe_code)]

pub mod errors;
pub mod logging;
pub mod protocol;
pub mod router;
pub mod store;
pub mod value;

pub use errors::{BusError, DecodeError, ProtocolError, Result};
pub use protocol::{Change, decode_inbound, encode_change};
pub use router::{DispatchReport, SubscriptionRouter};
pub use store::{Entry, EntryKey, Store};
pub use value::WireValue;
