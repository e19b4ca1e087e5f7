//! Wire protocol: one JSON object per text frame.
//!
//! Inbound and outbound messages share a shape:
//!
//! ```text
//! {"scope": "<scope>", "id": "<id>", "value": <any JSON>}
//! ```
//!
//! `value` is carried as raw JSON end to end and embedded verbatim on the
//! way out. Unknown fields (such as the legacy `type` discriminator) are
//! ignored on the way in.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::value::RawValue;

use crate::errors::ProtocolError;
use crate::value::WireValue;

/// One `(scope, id, value)` change, borrowed.
///
/// Handed to subscribers and encoded for broadcast.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct Change<'a> {
    /// Scope of the changed entry.
    pub scope: &'a str,
    /// Id of the changed entry.
    pub id: &'a str,
    /// New value.
    pub value: &'a WireValue,
}

/// A parsed inbound message.
#[derive(Debug, PartialEq, Eq)]
pub struct Inbound {
    /// Target scope.
    pub scope: String,
    /// Target id.
    pub id: String,
    /// Value to store.
    pub value: WireValue,
}

/// Parse one inbound text frame.
///
/// Syntax errors and non-object payloads yield [`ProtocolError::Parse`];
/// absent or non-string `scope`/`id` and an absent `value` yield validation
/// errors. A present `null` value is accepted.
pub fn decode_inbound(text: &str) -> Result<Inbound, ProtocolError> {
    let mut fields: HashMap<String, Box<RawValue>> = serde_json::from_str(text)?;

    let scope = take_string(&mut fields, "scope")?;
    let id = take_string(&mut fields, "id")?;
    let value = fields
        .remove("value")
        .ok_or(ProtocolError::MissingField("value"))?;

    Ok(Inbound {
        scope,
        id,
        value: WireValue::from(value),
    })
}

fn take_string(
    fields: &mut HashMap<String, Box<RawValue>>,
    name: &'static str,
) -> Result<String, ProtocolError> {
    let raw = fields
        .remove(name)
        .ok_or(ProtocolError::MissingField(name))?;
    serde_json::from_str(raw.get()).map_err(|_| ProtocolError::InvalidField(name))
}

/// Encode a change notification.
pub fn encode_change(scope: &str, id: &str, value: &WireValue) -> serde_json::Result<String> {
    serde_json::to_string(&Change { scope, id, value })
}
