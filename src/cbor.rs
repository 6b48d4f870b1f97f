//! Thin boundary over the generic CBOR codec
//!
//! The rest of the crate only ever calls `encode` and `decode`; the codec's
//! internal algorithm is ciborium's business.

use crate::error::{StashError, StashResult};
use ciborium::value::Value;

/// Encode a structured value into CBOR bytes
pub fn encode(value: &Value) -> StashResult<Vec<u8>> {
    let mut bytes = Vec::new();
    ciborium::ser::into_writer(value, &mut bytes)
        .map_err(|e| StashError::Envelope(format!("encode: {e}")))?;
    Ok(bytes)
}

/// Decode CBOR bytes into a structured value
pub fn decode(bytes: &[u8]) -> StashResult<Value> {
    ciborium::de::from_reader(bytes).map_err(|e| StashError::Envelope(format!("decode: {e}")))
}
