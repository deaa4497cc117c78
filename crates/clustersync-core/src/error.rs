//! Error types for clustersync core.

use thiserror::Error;

use crate::types::BlockHash;

/// Core errors raised by key handling and canonical encoding.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("malformed header: {0}")]
    MalformedHeader(String),

    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("decoding error: {0}")]
    DecodingError(String),
}

/// Validation errors for headers and blocks.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("seal verification failed for block {hash} at height {number}")]
    SealFailed { number: u64, hash: BlockHash },

    #[error("block {hash} sealed by unauthorized key {sealer}")]
    UnauthorizedSealer { hash: BlockHash, sealer: String },

    #[error("body hash does not match header for block {0}")]
    BodyHashMismatch(BlockHash),

    #[error("body kind does not match chain of block {0}")]
    BodyKindMismatch(BlockHash),

    #[error("structural error: {0}")]
    StructuralError(String),
}
