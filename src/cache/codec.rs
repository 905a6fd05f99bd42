//! Value encoding for the remote tier.
//!
//! Values are stored as a two-byte marker followed by the payload:
//!
//! - `j:` structured JSON
//! - `b:` opaque binary (raw bytes, or MessagePack for typed values JSON rejects)
//!
//! Payloads without a marker are decoded as JSON when possible and as raw
//! bytes otherwise.

use bytes::Bytes;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use thiserror::Error;

const STRUCTURED_MARKER: &[u8] = b"j:";
const BINARY_MARKER: &[u8] = b"b:";

/// A cached payload.
#[derive(Debug, Clone, PartialEq)]
pub enum CachedValue {
    /// JSON-representable value.
    Structured(Value),
    /// Opaque bytes (images, MessagePack-encoded values).
    Binary(Bytes),
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("value cannot be encoded (json: {json}; msgpack: {packed})")]
    Unencodable {
        json: serde_json::Error,
        packed: rmp_serde::encode::Error,
    },
    #[error("malformed structured payload: {0}")]
    Structured(#[from] serde_json::Error),
    #[error("malformed binary payload: {0}")]
    Binary(#[from] rmp_serde::decode::Error),
}

impl CachedValue {
    /// Encode a serializable value, preferring JSON and falling back to MessagePack.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self, CodecError> {
        match serde_json::to_value(value) {
            Ok(json) => Ok(Self::Structured(json)),
            Err(json) => match rmp_serde::to_vec_named(value) {
                Ok(packed) => Ok(Self::Binary(Bytes::from(packed))),
                Err(packed) => Err(CodecError::Unencodable { json, packed }),
            },
        }
    }

    /// Decode into a concrete type, using the encoding matching the variant.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, CodecError> {
        match self {
            Self::Structured(json) => Ok(T::deserialize(json)?),
            Self::Binary(bytes) => Ok(rmp_serde::from_slice(bytes)?),
        }
    }

    /// Wire representation for the remote tier.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        match self {
            Self::Structured(json) => {
                let mut out = STRUCTURED_MARKER.to_vec();
                serde_json::to_writer(&mut out, json)?;
                Ok(out)
            }
            Self::Binary(bytes) => {
                let mut out = Vec::with_capacity(BINARY_MARKER.len() + bytes.len());
                out.extend_from_slice(BINARY_MARKER);
                out.extend_from_slice(bytes);
                Ok(out)
            }
        }
    }

    /// Parse a wire payload produced by [`CachedValue::to_bytes`].
    pub fn from_bytes(data: &[u8]) -> Result<Self, CodecError> {
        if let Some(json) = data.strip_prefix(STRUCTURED_MARKER) {
            return Ok(Self::Structured(serde_json::from_slice(json)?));
        }
        if let Some(raw) = data.strip_prefix(BINARY_MARKER) {
            return Ok(Self::Binary(Bytes::copy_from_slice(raw)));
        }

        // Unmarked payload written by an older producer.
        match serde_json::from_slice(data) {
            Ok(json) => Ok(Self::Structured(json)),
            Err(_) => Ok(Self::Binary(Bytes::copy_from_slice(data))),
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Structured(json) => Some(json),
            Self::Binary(_) => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Self::Binary(bytes) => Some(bytes),
            Self::Structured(_) => None,
        }
    }
}

impl From<Value> for CachedValue {
    fn from(value: Value) -> Self {
        Self::Structured(value)
    }
}

impl From<Bytes> for CachedValue {
    fn from(value: Bytes) -> Self {
        Self::Binary(value)
    }
}

impl From<Vec<u8>> for CachedValue {
    fn from(value: Vec<u8>) -> Self {
        Self::Binary(Bytes::from(value))
    }
}

impl From<String> for CachedValue {
    fn from(value: String) -> Self {
        Self::Structured(Value::String(value))
    }
}

impl From<&str> for CachedValue {
    fn from(value: &str) -> Self {
        Self::Structured(Value::String(value.to_string()))
    }
}
