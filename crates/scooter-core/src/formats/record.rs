//! # Record Format
//!
//! Every value written to the store is one version byte followed by the
//! postcard encoding of the record.
//!
//! Compare-and-swap compares raw bytes, so encoding must be deterministic:
//! the same record always produces the same bytes. Postcard guarantees this
//! for the struct and `Option`/`String`/integer fields used by the records.
//!
//! ## Validation
//!
//! Size and version are checked before the payload is decoded.

use crate::{ScooterError, primitives};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Encode a record (version byte + postcard payload).
pub fn encode<T: Serialize>(record: &T) -> Result<Vec<u8>, ScooterError> {
    let payload =
        postcard::to_stdvec(record).map_err(|e| ScooterError::SerializationError(e.to_string()))?;
    if payload.len() + 1 > primitives::MAX_RECORD_SIZE {
        return Err(ScooterError::SerializationError(format!(
            "Record size {} bytes exceeds maximum allowed {} bytes",
            payload.len() + 1,
            primitives::MAX_RECORD_SIZE
        )));
    }

    let mut bytes = Vec::with_capacity(payload.len() + 1);
    bytes.push(primitives::RECORD_FORMAT_VERSION);
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

/// Decode a record written by [`encode`].
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ScooterError> {
    if bytes.len() > primitives::MAX_RECORD_SIZE {
        return Err(ScooterError::SerializationError(format!(
            "Record size {} bytes exceeds maximum allowed {} bytes",
            bytes.len(),
            primitives::MAX_RECORD_SIZE
        )));
    }

    let Some((&version, payload)) = bytes.split_first() else {
        return Err(ScooterError::SerializationError(
            "Empty record".to_string(),
        ));
    };
    if version != primitives::RECORD_FORMAT_VERSION {
        return Err(ScooterError::SerializationError(format!(
            "Unsupported record version: {} (expected {})",
            version,
            primitives::RECORD_FORMAT_VERSION
        )));
    }

    postcard::from_bytes(payload)
        .map_err(|e| ScooterError::SerializationError(format!("Failed to decode record: {}", e)))
}

// =============================================================================
// TESTS
// =============================================================================
