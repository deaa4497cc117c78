//! CBOR helpers for operation payloads.

use bytes::Bytes;
use serde::{de::DeserializeOwned, Serialize};

use crate::error::{Result, RpcError};

/// Encode a payload value as CBOR.
pub fn encode_payload<T: Serialize>(value: &T) -> Result<Bytes> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|e| RpcError::Codec(e.to_string()))?;
    Ok(Bytes::from(buf))
}

/// Decode a CBOR payload.
pub fn decode_payload<T: DeserializeOwned>(data: &[u8]) -> Result<T> {
    ciborium::from_reader(data).map_err(|e| RpcError::Codec(e.to_string()))
}
