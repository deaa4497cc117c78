//! Error types for the sync module.

use clustersync_core::{BlockHash, ValidationError};
use thiserror::Error;

/// Errors that can occur during sync operations.
///
/// A fork too old to reconcile is not an error; see
/// [`SyncOutcome::Stale`](crate::SyncOutcome::Stale).
#[derive(Debug, Error)]
pub enum SyncError {
    /// A header's seal failed the chain's consensus rule.
    #[error("seal validation failed for header {number} ({hash}): {source}")]
    InvalidSeal {
        number: u64,
        hash: BlockHash,
        #[source]
        source: ValidationError,
    },

    /// The peer returned no headers for a parent it should know.
    #[error("peer returned no headers for parent {parent}")]
    EmptyHeaderBatch { parent: BlockHash },

    /// The first header returned is not the one requested.
    #[error("header batch starts at {received}, requested {requested}")]
    UnanchoredHeaders {
        requested: BlockHash,
        received: BlockHash,
    },

    /// Headers are not strictly descending by one.
    #[error("headers should have descending order with step 1: {previous} then {next}")]
    NonDescendingHeaders { previous: u64, next: u64 },

    /// A header is not the parent of the header before it.
    #[error("headers should be correctly linked: {hash} at {number} is not the expected parent")]
    UnlinkedHeaders { number: u64, hash: BlockHash },

    /// The peer returned fewer or more blocks than requested.
    #[error("bad peer missing blocks for given headers: requested {requested}, received {received}")]
    MissingBlocks { requested: usize, received: usize },

    /// The peer returned blocks other than the ones requested.
    #[error("peer returned {unexpected} blocks that were not requested")]
    UnexpectedBlocks { unexpected: usize },

    /// Store operation failed.
    #[error("store error: {0}")]
    Store(#[from] clustersync_store::StoreError),

    /// Transport-level error.
    #[error("rpc error: {0}")]
    Rpc(#[from] clustersync_rpc::RpcError),

    /// The peer answered with an application error code.
    #[error("peer rejected {op} with error code {code}")]
    Peer { op: &'static str, code: u32 },

    /// The hook run before committing a block failed.
    #[error("pre-commit failed for block {number} ({hash}): {reason}")]
    PreCommit {
        number: u64,
        hash: BlockHash,
        reason: String,
    },

    /// The synchronizer is no longer accepting tasks.
    #[error("synchronizer closed")]
    Closed,
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
