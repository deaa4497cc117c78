//! Error types for the store module.

use clustersync_core::{BlockHash, ValidationError};
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Header or body serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A block failed validation on insert.
    #[error("invalid block: {0}")]
    Validation(#[from] ValidationError),

    /// The parent of a non-genesis block is not stored.
    #[error("missing parent {parent} for block {hash} at height {number}")]
    MissingParent {
        hash: BlockHash,
        parent: BlockHash,
        number: u64,
    },

    /// The height does not fit the database's signed integer column.
    #[error("block height {0} is out of range")]
    HeightOutOfRange(u64),

    /// Block not found.
    #[error("block not found: {0}")]
    NotFound(BlockHash),

    /// The store holds no blocks, so it has no tip.
    #[error("store is empty")]
    Empty,

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// A lock was poisoned by a panicking writer.
    #[error("store lock poisoned")]
    Poisoned,

    /// A blocking database task failed to complete.
    #[error("blocking task failed: {0}")]
    Task(String),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
