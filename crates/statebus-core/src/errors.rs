//! Error types for the bus core.

use thiserror::Error;

/// Errors returned to direct callers of the store and the bus API.
#[derive(Debug, Error)]
pub enum BusError {
    /// `try_update` on a key that has never been set.
    #[error("no entry for {scope}/{id}")]
    NotFound {
        /// Scope of the missing key.
        scope: String,
        /// Id of the missing key.
        id: String,
    },
    /// A stored value could not be decoded into the requested type.
    #[error("failed to decode {scope}/{id}: {source}")]
    Decode {
        /// Scope of the entry.
        scope: String,
        /// Id of the entry.
        id: String,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
    /// A value could not be serialized into its wire form.
    #[error("failed to encode value: {0}")]
    Encode(#[source] serde_json::Error),
}

impl BusError {
    /// Build a [`BusError::NotFound`] for a key.
    pub fn not_found(scope: &str, id: &str) -> Self {
        Self::NotFound {
            scope: scope.to_owned(),
            id: id.to_owned(),
        }
    }
}

/// Result type for bus operations.
pub type Result<T> = std::result::Result<T, BusError>;

/// Why an inbound message was rejected.
///
/// Rejected messages are dropped by the transport; these never reach the
/// client.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The payload is not a JSON object.
    #[error("malformed message: {0}")]
    Parse(#[from] serde_json::Error),
    /// A required field is absent.
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    /// A required field has the wrong shape (`scope` and `id` must be strings).
    #[error("field `{0}` must be a string")]
    InvalidField(&'static str),
}

/// A typed subscriber could not decode a published value.
///
/// Isolated to the one handler; other handlers still run.
#[derive(Debug, Error)]
#[error("subscriber for {target} could not decode {scope}/{id}: {source}")]
pub struct DecodeError {
    /// Scope of the change.
    pub scope: String,
    /// Id of the change.
    pub id: String,
    /// Name of the handler's target type.
    pub target: &'static str,
    /// Underlying JSON error.
    #[source]
    pub source: serde_json::Error,
}
