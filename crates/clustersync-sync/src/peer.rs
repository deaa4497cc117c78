//! Peer-fetch capability and its RPC-backed implementations.
//!
//! A [`SyncTask`](crate::SyncTask) never talks to the network directly. It
//! asks a [`PeerFetcher`] for headers and blocks, and optionally runs a
//! [`PreCommit`] hook before each block is stored.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

use clustersync_core::{Block, BlockBody, BlockHash, ChainId, Header};
use clustersync_rpc::{decode_payload, encode_payload, Op, Request, RpcClient};
use clustersync_store::ChainStore;

use crate::error::{Result, SyncError};
use crate::messages::{
    error_code, GetBlocksRequest, GetBlocksResponse, GetHeadersRequest, GetHeadersResponse,
    SyncMinorBlockListRequest,
};
use crate::task::SizeLimits;

/// Fetches chain data from one remote peer.
#[async_trait]
pub trait PeerFetcher: Send + Sync {
    /// Up to `limit` headers walking back from `parent` (inclusive),
    /// newest first.
    async fn fetch_headers(&self, parent: BlockHash, limit: usize) -> Result<Vec<Header>>;

    /// Blocks for `hashes`.
    async fn fetch_blocks(&self, hashes: &[BlockHash]) -> Result<Vec<Block>>;

    /// Batch sizes to request with.
    fn size_limits(&self) -> SizeLimits;

    /// Hook to run before each block is committed, if any.
    fn pre_commit(&self) -> Option<&dyn PreCommit> {
        None
    }
}

/// Runs before a synced block is committed. An error aborts the sync.
#[async_trait]
pub trait PreCommit: Send + Sync {
    async fn pre_commit(&self, block: &Block, store: &dyn ChainStore) -> Result<()>;
}

/// A [`PeerFetcher`] that calls a remote node over the cluster RPC.
pub struct RpcPeer {
    client: Arc<RpcClient>,
    endpoint: String,
    chain: ChainId,
    limits: SizeLimits,
    pre_commit: Option<Arc<dyn PreCommit>>,
}

impl RpcPeer {
    /// Fetch `chain` from `endpoint` with the chain's default size limits.
    pub fn new(client: Arc<RpcClient>, endpoint: impl Into<String>, chain: ChainId) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            chain,
            limits: SizeLimits::for_chain(chain),
            pre_commit: None,
        }
    }

    /// Override the batch sizes.
    pub fn with_size_limits(mut self, limits: SizeLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Run `hook` before each block is committed.
    pub fn with_pre_commit(mut self, hook: Arc<dyn PreCommit>) -> Self {
        self.pre_commit = Some(hook);
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn chain(&self) -> ChainId {
        self.chain
    }

    async fn call<Req, Resp>(&self, op: Op, payload: &Req) -> Result<Resp>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let request = Request::new(op, encode_payload(payload)?);
        let response = self.client.call(&self.endpoint, request).await?;
        if !response.is_ok() {
            return Err(SyncError::Peer {
                op: op.name(),
                code: response.error_code,
            });
        }
        Ok(decode_payload(&response.data)?)
    }
}

#[async_trait]
impl PeerFetcher for RpcPeer {
    async fn fetch_headers(&self, parent: BlockHash, limit: usize) -> Result<Vec<Header>> {
        let request = GetHeadersRequest {
            chain: self.chain,
            parent,
            limit: u32::try_from(limit).unwrap_or(u32::MAX),
        };
        let response: GetHeadersResponse = self.call(Op::GetMinorBlockHeaders, &request).await?;
        Ok(response.headers)
    }

    async fn fetch_blocks(&self, hashes: &[BlockHash]) -> Result<Vec<Block>> {
        let request = GetBlocksRequest {
            chain: self.chain,
            hashes: hashes.to_vec(),
        };
        let response: GetBlocksResponse = self.call(Op::GetMinorBlocks, &request).await?;
        Ok(response.blocks)
    }

    fn size_limits(&self) -> SizeLimits {
        self.limits
    }

    fn pre_commit(&self) -> Option<&dyn PreCommit> {
        self.pre_commit.as_deref()
    }
}

/// Root-chain pre-commit: before a root block is stored, every slave must
/// hold the shard blocks it confirms.
pub struct MinorBlockListSync {
    client: Arc<RpcClient>,
    slave_endpoints: Vec<String>,
}

impl MinorBlockListSync {
    /// `client` must target slave servers.
    pub fn new(client: Arc<RpcClient>, slave_endpoints: Vec<String>) -> Self {
        Self {
            client,
            slave_endpoints,
        }
    }
}

#[async_trait]
impl PreCommit for MinorBlockListSync {
    async fn pre_commit(&self, block: &Block, _store: &dyn ChainStore) -> Result<()> {
        let BlockBody::Root { minor_headers } = &block.body else {
            return Ok(());
        };
        if minor_headers.is_empty() {
            return Ok(());
        }

        let hash = block.hash();
        let payload = encode_payload(&SyncMinorBlockListRequest {
            root_block: hash,
            minor_headers: minor_headers.clone(),
        })?;

        for endpoint in &self.slave_endpoints {
            let request = Request::new(Op::SyncMinorBlockList, payload.clone());
            let failure = match self.client.call(endpoint, request).await {
                Ok(response) if response.is_ok() => continue,
                Ok(response) if response.error_code == error_code::SYNC_FAILED => {
                    format!("{} could not sync the confirmed minor blocks", endpoint)
                }
                Ok(response) => format!("{} returned error code {}", endpoint, response.error_code),
                Err(err) => format!("{}: {}", endpoint, err),
            };
            tracing::warn!(
                height = block.number(),
                hash = %hash,
                endpoint = %endpoint,
                "slave failed to sync minor block list"
            );
            return Err(SyncError::PreCommit {
                number: block.number(),
                hash,
                reason: failure,
            });
        }

        tracing::debug!(
            height = block.number(),
            minor_blocks = minor_headers.len(),
            slaves = self.slave_endpoints.len(),
            "minor block list synced"
        );
        Ok(())
    }
}
