//! Catch-up sync task.
//!
//! Given a header announced by a peer, walk back through the peer's headers
//! until reaching one whose parent is stored locally, then download the
//! blocks in between and commit them oldest first.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use clustersync_core::{BlockHash, ChainId, Header};
use clustersync_store::{ChainStore, InsertResult};

use crate::error::{Result, SyncError};
use crate::peer::PeerFetcher;

/// Headers requested per batch when syncing the root chain.
pub const ROOT_BLOCK_HEADER_LIST_LIMIT: usize = 500;
/// Blocks requested per batch when syncing the root chain.
pub const ROOT_BLOCK_BATCH_SIZE: usize = 100;
/// Headers requested per batch when syncing a shard chain.
pub const MINOR_BLOCK_HEADER_LIST_LIMIT: usize = 100;
/// Blocks requested per batch when syncing a shard chain.
pub const MINOR_BLOCK_BATCH_SIZE: usize = 50;

/// Default bound on how far below the local tip a fork may start.
pub const DEFAULT_MAX_SYNC_STALENESS: u64 = 22500;

/// Batch sizes for one peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeLimits {
    /// Max headers per header request.
    pub header_batch: usize,
    /// Max blocks per block request.
    pub block_batch: usize,
}

impl SizeLimits {
    /// Limits with both values clamped to at least one.
    pub fn new(header_batch: usize, block_batch: usize) -> Self {
        Self {
            header_batch: header_batch.max(1),
            block_batch: block_batch.max(1),
        }
    }

    /// Default limits for a chain.
    pub fn for_chain(chain: ChainId) -> Self {
        match chain {
            ChainId::Root => Self::new(ROOT_BLOCK_HEADER_LIST_LIMIT, ROOT_BLOCK_BATCH_SIZE),
            ChainId::Shard(_) => Self::new(MINOR_BLOCK_HEADER_LIST_LIMIT, MINOR_BLOCK_BATCH_SIZE),
        }
    }

    fn clamped(self) -> Self {
        Self::new(self.header_batch, self.block_batch)
    }
}

/// Configuration for sync behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Give up on forks starting more than this many blocks below the tip.
    pub max_sync_staleness: u64,
    /// Require each block window to contain exactly the requested hashes,
    /// not just the requested count.
    pub verify_block_hashes: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_sync_staleness: DEFAULT_MAX_SYNC_STALENESS,
            verify_block_hashes: false,
        }
    }
}

/// How a sync task finished without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The target block was already stored. Nothing was fetched.
    AlreadyKnown,
    /// The fork point is too far below the local tip; nothing was applied.
    Stale { tip_height: u64, fork_height: u64 },
    /// Every missing block up to the target was committed.
    Synced { applied: usize },
}

/// One reconciliation attempt against one target header on one peer.
///
/// Single use: [`SyncTask::run`] consumes the task.
pub struct SyncTask {
    header: Header,
    peer: Arc<dyn PeerFetcher>,
    config: SyncConfig,
    name: String,
    peer_id: String,
}

impl SyncTask {
    pub fn new(header: Header, peer: Arc<dyn PeerFetcher>, config: SyncConfig) -> Self {
        let name = format!("{}:{}", header.chain, header.number);
        Self {
            header,
            peer,
            config,
            name,
            peer_id: String::new(),
        }
    }

    /// Label used in logs.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Identify the peer this task fetches from.
    pub fn with_peer_id(mut self, peer_id: impl Into<String>) -> Self {
        self.peer_id = peer_id.into();
        self
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn peer_id(&self) -> &str {
        &self.peer_id
    }

    /// Bring `store` up to the target header.
    ///
    /// Blocks are committed in ascending height order. A failure part way
    /// leaves the blocks committed so far in place; re-running the task
    /// picks up from there.
    pub async fn run(self, store: &dyn ChainStore) -> Result<SyncOutcome> {
        let target = self.header.hash();
        if store.has_block(&target).await? {
            return Ok(SyncOutcome::AlreadyKnown);
        }

        store
            .validate_seal(&self.header)
            .map_err(|source| SyncError::InvalidSeal {
                number: self.header.number,
                hash: target,
                source,
            })?;

        let tip_height = store.current_header().await?.number;
        let limits = self.peer.size_limits().clamped();

        // Newest first; grows toward older blocks.
        let mut chain = vec![target];
        let mut frontier = self.header.clone();

        while !store.has_block(&frontier.parent_hash).await? {
            let height = frontier.number;
            if tip_height > height && tip_height - height > self.config.max_sync_staleness {
                tracing::warn!(
                    task = %self.name,
                    tip_height,
                    fork_height = height,
                    "abort syncing due to forking at super old block"
                );
                return Ok(SyncOutcome::Stale {
                    tip_height,
                    fork_height: height,
                });
            }

            tracing::info!(
                task = %self.name,
                height,
                hash = %frontier.hash(),
                "downloading block header list"
            );
            let headers = self
                .peer
                .fetch_headers(frontier.parent_hash, limits.header_batch)
                .await?;
            validate_header_list(store, &frontier, &headers)?;

            for header in headers {
                let hash = header.hash();
                if store.has_block(&hash).await? {
                    break;
                }
                chain.push(hash);
                frontier = header;
            }
        }

        tracing::info!(
            task = %self.name,
            length = chain.len(),
            from = frontier.number,
            to = self.header.number,
            "downloading blocks"
        );

        let hook = self.peer.pre_commit();
        let mut applied = 0;
        let mut end = chain.len();
        while end > 0 {
            let start = end.saturating_sub(limits.block_batch);
            let window = &chain[start..end];

            let mut blocks = self.peer.fetch_blocks(window).await?;
            if blocks.len() != window.len() {
                tracing::error!(
                    task = %self.name,
                    requested = window.len(),
                    received = blocks.len(),
                    "bad peer missing blocks for given headers"
                );
                return Err(SyncError::MissingBlocks {
                    requested: window.len(),
                    received: blocks.len(),
                });
            }
            if self.config.verify_block_hashes {
                let requested: HashSet<BlockHash> = window.iter().copied().collect();
                let unexpected = blocks
                    .iter()
                    .filter(|block| !requested.contains(&block.hash()))
                    .count();
                if unexpected > 0 {
                    tracing::error!(task = %self.name, unexpected, "peer returned unrequested blocks");
                    return Err(SyncError::UnexpectedBlocks { unexpected });
                }
            }

            blocks.sort_by_key(|block| block.number());
            for block in &blocks {
                let height = block.number();
                let hash = block.hash();
                tracing::info!(task = %self.name, height, hash = %hash, "syncing block starts");
                let started = Instant::now();

                if let Some(hook) = hook {
                    hook.pre_commit(block, store).await?;
                }
                if store.add_block(block).await? == InsertResult::Inserted {
                    applied += 1;
                }

                tracing::info!(
                    task = %self.name,
                    height,
                    hash = %hash,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "syncing block finishes"
                );
            }

            end = start;
        }

        Ok(SyncOutcome::Synced { applied })
    }
}

/// Check a header batch fetched for the parent of `frontier`.
///
/// The batch must be non-empty and start at the frontier's parent, one
/// height below it. Each header must descend by exactly one, be the parent
/// of the one before it and carry a valid seal.
pub fn validate_header_list(
    store: &dyn ChainStore,
    frontier: &Header,
    headers: &[Header],
) -> Result<()> {
    let parent = frontier.parent_hash;
    let first = headers
        .first()
        .ok_or(SyncError::EmptyHeaderBatch { parent })?;
    let first_hash = first.hash();
    if first_hash != parent {
        return Err(SyncError::UnanchoredHeaders {
            requested: parent,
            received: first_hash,
        });
    }

    let mut previous = frontier;
    for (index, header) in headers.iter().enumerate() {
        let hash = header.hash();
        if header.number.checked_add(1) != Some(previous.number) {
            return Err(SyncError::NonDescendingHeaders {
                previous: previous.number,
                next: header.number,
            });
        }
        // The first header is the frontier's parent by hash, checked above.
        if index > 0 && previous.parent_hash != hash {
            return Err(SyncError::UnlinkedHeaders {
                number: header.number,
                hash,
            });
        }
        store
            .validate_seal(header)
            .map_err(|source| SyncError::InvalidSeal {
                number: header.number,
                hash,
                source,
            })?;
        previous = header;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peer::PreCommit;
    use async_trait::async_trait;
    use clustersync_core::{AuthoritySeal, Block, BlockBody, Keypair};
    use clustersync_store::MemoryChainStore;
    use std::sync::Mutex;

    fn shard_chain(len: u64) -> Vec<Block> {
        let keypair = Keypair::from_seed(&[7; 32]);
        let mut blocks = Vec::new();
        let mut parent = BlockHash::ZERO;
        for number in 0..len {
            let block = Block::sealed(
                ChainId::Shard(1),
                number,
                parent,
                number as i64,
                BlockBody::empty_for(ChainId::Shard(1)),
                &keypair,
            );
            parent = block.hash();
            blocks.push(block);
        }
        blocks
    }

    fn store_with(blocks: &[Block]) -> MemoryChainStore {
        let store = MemoryChainStore::new(Arc::new(AuthoritySeal::open()));
        for block in blocks {
            store.insert_trusted(block.clone()).unwrap();
        }
        store
    }

    /// Serves a fixed chain and counts calls.
    struct FixedPeer {
        blocks: Vec<Block>,
        limits: SizeLimits,
        header_calls: Mutex<usize>,
        block_calls: Mutex<Vec<usize>>,
        hook: Option<Arc<dyn PreCommit>>,
    }

    impl FixedPeer {
        fn new(blocks: Vec<Block>, limits: SizeLimits) -> Self {
            Self {
                blocks,
                limits,
                header_calls: Mutex::new(0),
                block_calls: Mutex::new(Vec::new()),
                hook: None,
            }
        }
    }

    #[async_trait]
    impl PeerFetcher for FixedPeer {
        async fn fetch_headers(&self, parent: BlockHash, limit: usize) -> Result<Vec<Header>> {
            *self.header_calls.lock().unwrap() += 1;
            let Some(pos) = self.blocks.iter().position(|b| b.hash() == parent) else {
                return Ok(Vec::new());
            };
            Ok(self.blocks[..=pos]
                .iter()
                .rev()
                .take(limit)
                .map(|b| b.header.clone())
                .collect())
        }

        async fn fetch_blocks(&self, hashes: &[BlockHash]) -> Result<Vec<Block>> {
            self.block_calls.lock().unwrap().push(hashes.len());
            Ok(self
                .blocks
                .iter()
                .filter(|b| hashes.contains(&b.hash()))
                .cloned()
                .collect())
        }

        fn size_limits(&self) -> SizeLimits {
            self.limits
        }

        fn pre_commit(&self) -> Option<&dyn PreCommit> {
            self.hook.as_deref()
        }
    }

    struct RecordingHook {
        seen: Mutex<Vec<u64>>,
    }

    #[async_trait]
    impl PreCommit for RecordingHook {
        async fn pre_commit(&self, block: &Block, store: &dyn ChainStore) -> Result<()> {
            assert!(!store.has_block(&block.hash()).await?);
            self.seen.lock().unwrap().push(block.number());
            Ok(())
        }
    }

    #[test]
    fn test_size_limits() {
        assert_eq!(SizeLimits::for_chain(ChainId::Root), SizeLimits::new(500, 100));
        assert_eq!(SizeLimits::for_chain(ChainId::Shard(3)), SizeLimits::new(100, 50));
        assert_eq!(SizeLimits::new(0, 0), SizeLimits::new(1, 1));
    }

    #[test]
    fn test_sync_config_from_json() {
        let config: SyncConfig = serde_json::from_str(r#"{"max_sync_staleness": 10}"#).unwrap();
        assert_eq!(config.max_sync_staleness, 10);
        assert!(!config.verify_block_hashes);
    }

    #[tokio::test]
    async fn test_already_known_fetches_nothing() {
        let blocks = shard_chain(4);
        let store = store_with(&blocks);
        let peer = Arc::new(FixedPeer::new(blocks.clone(), SizeLimits::new(10, 10)));

        let task = SyncTask::new(blocks[3].header.clone(), peer.clone(), SyncConfig::default());
        assert_eq!(task.run(&store).await.unwrap(), SyncOutcome::AlreadyKnown);
        assert_eq!(*peer.header_calls.lock().unwrap(), 0);
        assert!(peer.block_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_windows_and_batches() {
        let blocks = shard_chain(12);
        let store = store_with(&blocks[..2]);
        let peer = Arc::new(FixedPeer::new(blocks.clone(), SizeLimits::new(3, 4)));

        let task = SyncTask::new(blocks[11].header.clone(), peer.clone(), SyncConfig::default());
        let outcome = task.run(&store).await.unwrap();

        assert_eq!(outcome, SyncOutcome::Synced { applied: 10 });
        // 10 blocks to fetch, target known up front: 9 headers in batches of 3.
        assert_eq!(*peer.header_calls.lock().unwrap(), 3);
        // Oldest window first, the remainder lands on the newest blocks.
        assert_eq!(*peer.block_calls.lock().unwrap(), vec![4, 4, 2]);

        let order = store.insertion_order().unwrap();
        let synced: Vec<BlockHash> = blocks[2..].iter().map(|b| b.hash()).collect();
        assert_eq!(order[2..], synced[..]);
    }

    #[tokio::test]
    async fn test_pre_commit_runs_before_each_commit() {
        let blocks = shard_chain(6);
        let store = store_with(&blocks[..3]);
        let hook = Arc::new(RecordingHook {
            seen: Mutex::new(Vec::new()),
        });
        let mut peer = FixedPeer::new(blocks.clone(), SizeLimits::new(10, 10));
        peer.hook = Some(hook.clone());

        let task = SyncTask::new(blocks[5].header.clone(), Arc::new(peer), SyncConfig::default());
        task.run(&store).await.unwrap();

        assert_eq!(*hook.seen.lock().unwrap(), vec![3, 4, 5]);
    }

    #[tokio::test]
    async fn test_empty_header_batch_is_error() {
        let blocks = shard_chain(5);
        let store = store_with(&blocks[..1]);
        // The peer only knows the target, not its ancestors.
        let peer = Arc::new(FixedPeer::new(vec![blocks[4].clone()], SizeLimits::new(10, 10)));

        let task = SyncTask::new(blocks[4].header.clone(), peer, SyncConfig::default());
        assert!(matches!(
            task.run(&store).await,
            Err(SyncError::EmptyHeaderBatch { .. })
        ));
        assert_eq!(store.len().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_validate_header_list() {
        let blocks = shard_chain(6);
        let store = store_with(&blocks[..1]);
        let frontier = &blocks[4].header;
        let descending: Vec<Header> = blocks[1..4].iter().rev().map(|b| b.header.clone()).collect();

        validate_header_list(&store, frontier, &descending).unwrap();

        assert!(matches!(
            validate_header_list(&store, &blocks[5].header, &descending),
            Err(SyncError::UnanchoredHeaders { .. })
        ));

        let gapped = vec![blocks[3].header.clone(), blocks[1].header.clone()];
        assert!(matches!(
            validate_header_list(&store, frontier, &gapped),
            Err(SyncError::NonDescendingHeaders { previous: 3, next: 1 })
        ));

        let other = shard_chain_with_seed(3, [9; 32]);
        let unlinked = vec![blocks[3].header.clone(), other[2].header.clone()];
        assert!(matches!(
            validate_header_list(&store, frontier, &unlinked),
            Err(SyncError::UnlinkedHeaders { number: 2, .. })
        ));
    }

    /// A sealed header that names a real parent but skips heights.
    fn height_skipping_child(parent: &Block, number: u64) -> Block {
        Block::sealed(
            ChainId::Shard(1),
            number,
            parent.hash(),
            0,
            BlockBody::empty_for(ChainId::Shard(1)),
            &Keypair::from_seed(&[7; 32]),
        )
    }

    #[tokio::test]
    async fn test_frontier_height_must_follow_parent() {
        let blocks = shard_chain(4);
        let store = store_with(&blocks[..1]);
        let skipping = height_skipping_child(&blocks[3], 9);
        let descending: Vec<Header> = blocks[1..4].iter().rev().map(|b| b.header.clone()).collect();

        assert!(matches!(
            validate_header_list(&store, &skipping.header, &descending),
            Err(SyncError::NonDescendingHeaders { previous: 9, next: 3 })
        ));
    }

    #[tokio::test]
    async fn test_height_skipping_target_rejected() {
        let mut blocks = shard_chain(4);
        let store = store_with(&blocks[..1]);
        let skipping = height_skipping_child(&blocks[3], 9);
        blocks.push(skipping.clone());
        let peer = Arc::new(FixedPeer::new(blocks, SizeLimits::new(10, 10)));

        let task = SyncTask::new(skipping.header.clone(), peer.clone(), SyncConfig::default());
        assert!(matches!(
            task.run(&store).await,
            Err(SyncError::NonDescendingHeaders { previous: 9, next: 3 })
        ));
        assert!(peer.block_calls.lock().unwrap().is_empty());
        assert_eq!(store.len().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_invalid_target_seal() {
        let blocks = shard_chain(3);
        let outsider = Keypair::from_seed(&[8; 32]);
        let store = MemoryChainStore::new(Arc::new(AuthoritySeal::with_authorities([
            outsider.public_key(),
        ])));
        store.insert_trusted(blocks[0].clone()).unwrap();
        let peer = Arc::new(FixedPeer::new(blocks.clone(), SizeLimits::new(10, 10)));

        let task = SyncTask::new(blocks[2].header.clone(), peer.clone(), SyncConfig::default());
        assert!(matches!(
            task.run(&store).await,
            Err(SyncError::InvalidSeal { number: 2, .. })
        ));
        assert_eq!(*peer.header_calls.lock().unwrap(), 0);
    }

    fn shard_chain_with_seed(len: u64, seed: [u8; 32]) -> Vec<Block> {
        let keypair = Keypair::from_seed(&seed);
        let mut blocks = Vec::new();
        let mut parent = BlockHash([0xee; 32]);
        for number in 0..len {
            let block = Block::sealed(
                ChainId::Shard(1),
                number,
                parent,
                0,
                BlockBody::empty_for(ChainId::Shard(1)),
                &keypair,
            );
            parent = block.hash();
            blocks.push(block);
        }
        blocks
    }
}
