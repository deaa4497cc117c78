//! ChainStore trait: the abstract interface to the local block store.
//!
//! Sync tasks only ever see a store through this trait. Implementations
//! include SQLite (persistent) and in-memory (for tests).

use async_trait::async_trait;
use clustersync_core::{Block, BlockHash, Header, ValidationError};

use crate::error::Result;

/// Result of adding a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertResult {
    /// Block was stored.
    Inserted,
    /// Block already exists (idempotent - not an error).
    AlreadyExists,
}

/// The ChainStore trait: async interface to local chain storage.
///
/// # Design Notes
///
/// - **Concurrent use**: many sync tasks may share one store, so every method
///   takes `&self` and implementations synchronize internally.
/// - **Idempotent inserts**: adding a block that is already present returns
///   `AlreadyExists` and changes nothing. Sync relies on this instead of
///   rolling back partially applied runs.
/// - **Validated inserts**: `add_block` rejects blocks whose parent is
///   unknown (except genesis), whose body does not match the header, or whose
///   seal fails [`ChainStore::validate_seal`].
/// - **Tip**: the current header is the highest block stored; on equal height
///   the first one stored stays the tip.
#[async_trait]
pub trait ChainStore: Send + Sync {
    /// Check whether a block is stored.
    async fn has_block(&self, hash: &BlockHash) -> Result<bool>;

    /// Header of the current tip.
    async fn current_header(&self) -> Result<Header>;

    /// Check a header's seal against this chain's consensus rule.
    fn validate_seal(&self, header: &Header) -> std::result::Result<(), ValidationError>;

    /// Validate and store a block.
    async fn add_block(&self, block: &Block) -> Result<InsertResult>;

    /// Get a stored block by hash.
    async fn get_block(&self, hash: &BlockHash) -> Result<Option<Block>>;

    /// Get a stored header by hash.
    async fn get_header(&self, hash: &BlockHash) -> Result<Option<Header>>;
}

/// Extension trait for serving peers from a store.
pub trait ChainStoreExt: ChainStore {
    /// Headers walking backward from `from` (inclusive), newest first.
    ///
    /// Stops after `limit` headers, at genesis, or at the first unknown hash.
    fn headers_descending(
        &self,
        from: BlockHash,
        limit: usize,
    ) -> impl std::future::Future<Output = Result<Vec<Header>>> + Send;

    /// Blocks for the given hashes, in request order, skipping unknown ones.
    fn blocks_by_hash(
        &self,
        hashes: &[BlockHash],
    ) -> impl std::future::Future<Output = Result<Vec<Block>>> + Send;
}

impl<S: ChainStore + ?Sized> ChainStoreExt for S {
    async fn headers_descending(&self, from: BlockHash, limit: usize) -> Result<Vec<Header>> {
        let mut headers = Vec::with_capacity(limit.min(1024));
        let mut next = from;

        while headers.len() < limit {
            let Some(header) = self.get_header(&next).await? else {
                break;
            };
            next = header.parent_hash;
            let genesis = header.is_genesis();
            headers.push(header);
            if genesis {
                break;
            }
        }

        Ok(headers)
    }

    async fn blocks_by_hash(&self, hashes: &[BlockHash]) -> Result<Vec<Block>> {
        let mut blocks = Vec::with_capacity(hashes.len());
        for hash in hashes {
            if let Some(block) = self.get_block(hash).await? {
                blocks.push(block);
            }
        }
        Ok(blocks)
    }
}
