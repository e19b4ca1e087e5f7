//! Late-bound value representation.
//!
//! Values travel and rest as raw JSON text. Nothing in the bus interprets
//! them; subscribers and callers decode on demand into whatever type they
//! expect.

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Serialize, Serializer};
use serde_json::value::RawValue;

/// A stored value in its serialized JSON form.
///
/// Cloning is cheap (reference counted). Two clones of the same write are
/// [`same_write`](Self::same_write); this identity is what the store's
/// compare-and-swap loop compares.
#[derive(Clone)]
pub struct WireValue(Arc<RawValue>);

impl WireValue {
    /// Wrap raw JSON text after checking that it is valid JSON.
    pub fn from_json(json: impl Into<String>) -> Result<Self, serde_json::Error> {
        RawValue::from_string(json.into()).map(Self::from)
    }

    /// Serialize any value into its wire form.
    pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Self, serde_json::Error> {
        serde_json::value::to_raw_value(value).map(Self::from)
    }

    /// Decode the wire form into `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(self.0.get())
    }

    /// The raw JSON text.
    pub fn as_json(&self) -> &str {
        self.0.get()
    }

    /// Whether `other` is a clone of the very same write (pointer identity).
    pub fn same_write(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl From<Box<RawValue>> for WireValue {
    fn from(raw: Box<RawValue>) -> Self {
        Self(Arc::from(raw))
    }
}

/// Textual equality of the JSON form.
impl PartialEq for WireValue {
    fn eq(&self, other: &Self) -> bool {
        self.as_json() == other.as_json()
    }
}

impl Eq for WireValue {}

impl fmt::Debug for WireValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WireValue({})", self.as_json())
    }
}

impl fmt::Display for WireValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_json())
    }
}

impl Serialize for WireValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn from_json_rejects_invalid_text() {
        assert!(WireValue::from_json("{not json").is_err());
        assert!(WireValue::from_json("").is_err());
    }

    #[test]
    fn falsy_values_are_valid() {
        for text in ["false", "0", "\"\"", "null", "[]", "{}"] {
            let v = WireValue::from_json(text).unwrap();
            assert_eq!(v.as_json(), text);
        }
    }

    #[test]
    fn encode_then_decode_struct() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Gauge {
            label: String,
            level: f64,
        }
        let gauge = Gauge {
            label: "cpu".into(),
            level: 0.5,
        };
        let v = WireValue::encode(&gauge).unwrap();
        assert_eq!(v.as_json(), r#"{"label":"cpu","level":0.5}"#);
        assert_eq!(v.decode::<Gauge>().unwrap(), gauge);
    }

    #[test]
    fn decode_into_wrong_shape_fails() {
        let v = WireValue::from_json("\"text\"").unwrap();
        assert!(v.decode::<bool>().is_err());
        assert!(v.decode::<Vec<u8>>().is_err());
    }

    #[test]
    fn clones_share_identity() {
        let a = WireValue::from_json("1").unwrap();
        let b = a.clone();
        let c = WireValue::from_json("1").unwrap();
        assert!(a.same_write(&b));
        assert!(!a.same_write(&c));
        assert_eq!(a, c);
    }

    #[test]
    fn serializes_verbatim() {
        let v = WireValue::from_json(r#"{"a":[1,2]}"#).unwrap();
        assert_eq!(serde_json::to_string(&v).unwrap(), r#"{"a":[1,2]}"#);
    }
}
