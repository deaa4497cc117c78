//! Payloads for the sync-related cluster operations.
//!
//! These travel CBOR-encoded in [`clustersync_rpc::Request::data`] and
//! [`clustersync_rpc::Response::data`].

use serde::{Deserialize, Serialize};

use clustersync_core::{Block, BlockHash, ChainId, Header};

/// Application error codes carried in `Response::error_code`.
pub mod error_code {
    /// The payload could not be decoded.
    pub const BAD_REQUEST: u32 = 1;
    /// The server does not serve the requested chain.
    pub const WRONG_CHAIN: u32 = 2;
    /// The server's store failed.
    pub const STORE_FAILURE: u32 = 3;
    /// A slave's answer to `SyncMinorBlockList` when it could not fetch the
    /// confirmed shard blocks. [`crate::MinorBlockListSync`] reports it as a
    /// pre-commit failure.
    pub const SYNC_FAILED: u32 = 4;
}

/// `GetMinorBlockHeaders`: headers walking back from `parent` (inclusive).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetHeadersRequest {
    pub chain: ChainId,
    pub parent: BlockHash,
    pub limit: u32,
}

/// Headers, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetHeadersResponse {
    pub headers: Vec<Header>,
}

/// `GetMinorBlocks`: bodies for the given hashes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetBlocksRequest {
    pub chain: ChainId,
    pub hashes: Vec<BlockHash>,
}

/// The known blocks among those requested, in request order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetBlocksResponse {
    pub blocks: Vec<Block>,
}

/// `SyncMinorBlockList`: make sure a slave holds the shard blocks a root
/// block confirms before the root block is committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncMinorBlockListRequest {
    pub root_block: BlockHash,
    pub minor_headers: Vec<BlockHash>,
}
