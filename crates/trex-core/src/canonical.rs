//! # Canonical Serialization
//!
//! `CanonicalBytes` is the only input accepted by the digest functions in
//! [`crate::digest`]. Every protocol identifier that is derived rather than
//! chosen (contract addresses, key hashes, claim ids, claim signing
//! payloads) is a hash over canonical bytes, so two components that derive
//! the same identifier from the same logical data always agree.
//!
//! ## Rules
//!
//! 1. Floats are rejected. Amounts are integers.
//! 2. Object keys are sorted and separators are compact (RFC 8785 via
//!    `serde_jcs`).
//! 3. Everything else passes through its `Serialize` impl unchanged.

use serde::Serialize;
use serde_json::Value;

use crate::error::CanonicalizationError;

/// Bytes produced exclusively by JCS canonicalization.
///
/// The inner buffer is private; [`CanonicalBytes::new()`] is the only
/// constructor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalBytes(Vec<u8>);

impl CanonicalBytes {
    /// Canonicalize any serializable value.
    ///
    /// # Errors
    ///
    /// `FloatRejected` if the value contains a non-integer number,
    /// `SerializationFailed` if serde cannot represent it as JSON.
    pub fn new(obj: &impl Serialize) -> Result<Self, CanonicalizationError> {
        let value = serde_json::to_value(obj)?;
        let coerced = coerce_json_value(value)?;
        let s = serde_jcs::to_string(&coerced)?;
        Ok(Self(s.into_bytes()))
    }

    /// Access the canonical bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Length of the canonical byte sequence.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the canonical byte sequence is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for CanonicalBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

fn coerce_json_value(value: Value) -> Result<Value, CanonicalizationError> {
    match value {
        Value::Null | Value::Bool(_) | Value::String(_) => Ok(value),
        Value::Number(ref n) => {
            if n.is_f64() && !n.is_i64() && !n.is_u64() {
                if let Some(f) = n.as_f64() {
                    return Err(CanonicalizationError::FloatRejected(f));
                }
            }
            Ok(value)
        }
        Value::Object(map) => {
            let mut coerced = serde_json::Map::new();
            for (k, v) in map {
                coerced.insert(k, coerce_json_value(v)?);
            }
            Ok(Value::Object(coerced))
        }
        Value::Array(arr) => {
            let coerced: Result<Vec<_>, _> = arr.into_iter().map(coerce_json_value).collect();
            Ok(Value::Array(coerced?))
        }
    }
}
