//! Error types for a sync node.

use clustersync_rpc::RpcError;
use clustersync_store::StoreError;
use clustersync_sync::SyncError;
use thiserror::Error;

/// Errors that can occur during node operations.
#[derive(Debug, Error)]
pub enum NodeError {
    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// RPC error.
    #[error("rpc error: {0}")]
    Rpc(#[from] RpcError),

    /// Sync error.
    #[error("sync error: {0}")]
    Sync(#[from] SyncError),

    /// The node configuration is invalid.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Result type for node operations.
pub type Result<T> = std::result::Result<T, NodeError>;
