//! Scripted peers with fault injection.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use clustersync_core::{Block, BlockHash, Header};
use clustersync_store::ChainStore;
use clustersync_sync::{PeerFetcher, PreCommit, Result, SizeLimits, SyncError};

/// A call made to a [`ScriptedPeer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerCall {
    Headers { parent: BlockHash, limit: usize },
    Blocks { hashes: Vec<BlockHash> },
}

/// A peer serving a fixed set of blocks, optionally misbehaving.
pub struct ScriptedPeer {
    blocks: HashMap<BlockHash, Block>,
    limits: SizeLimits,
    dropped: HashSet<BlockHash>,
    skipped_heights: HashSet<u64>,
    replaced_headers: HashMap<u64, Header>,
    shuffle_seed: Option<u64>,
    hook: Option<Arc<dyn PreCommit>>,
    calls: Mutex<Vec<PeerCall>>,
}

impl ScriptedPeer {
    pub fn new(blocks: impl IntoIterator<Item = Block>, limits: SizeLimits) -> Self {
        Self {
            blocks: blocks.into_iter().map(|b| (b.hash(), b)).collect(),
            limits,
            dropped: HashSet::new(),
            skipped_heights: HashSet::new(),
            replaced_headers: HashMap::new(),
            shuffle_seed: None,
            hook: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Never return this block's body.
    pub fn drop_block(mut self, hash: BlockHash) -> Self {
        self.dropped.insert(hash);
        self
    }

    /// Leave the header at `height` out of header batches.
    pub fn skip_header(mut self, height: u64) -> Self {
        self.skipped_heights.insert(height);
        self
    }

    /// Serve `header` in place of the real header at its height.
    pub fn replace_header(mut self, header: Header) -> Self {
        self.replaced_headers.insert(header.number, header);
        self
    }

    /// Return block windows in a seeded random order.
    pub fn shuffle_blocks(mut self, seed: u64) -> Self {
        self.shuffle_seed = Some(seed);
        self
    }

    pub fn with_pre_commit(mut self, hook: Arc<dyn PreCommit>) -> Self {
        self.hook = Some(hook);
        self
    }

    /// Every call made so far.
    pub fn calls(&self) -> Vec<PeerCall> {
        self.lock_calls().clone()
    }

    /// Number of header requests made so far.
    pub fn header_requests(&self) -> usize {
        self.lock_calls()
            .iter()
            .filter(|call| matches!(call, PeerCall::Headers { .. }))
            .count()
    }

    /// Sizes of the block requests made so far.
    pub fn block_requests(&self) -> Vec<usize> {
        self.lock_calls()
            .iter()
            .filter_map(|call| match call {
                PeerCall::Blocks { hashes } => Some(hashes.len()),
                PeerCall::Headers { .. } => None,
            })
            .collect()
    }

    fn lock_calls(&self) -> MutexGuard<'_, Vec<PeerCall>> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl PeerFetcher for ScriptedPeer {
    async fn fetch_headers(&self, parent: BlockHash, limit: usize) -> Result<Vec<Header>> {
        self.lock_calls().push(PeerCall::Headers { parent, limit });

        let mut headers = Vec::new();
        let mut next = parent;
        while headers.len() < limit {
            let Some(block) = self.blocks.get(&next) else {
                break;
            };
            let header = &block.header;
            next = header.parent_hash;

            if !self.skipped_heights.contains(&header.number) {
                let served = self
                    .replaced_headers
                    .get(&header.number)
                    .unwrap_or(header)
                    .clone();
                headers.push(served);
            }
            if header.is_genesis() {
                break;
            }
        }
        Ok(headers)
    }

    async fn fetch_blocks(&self, hashes: &[BlockHash]) -> Result<Vec<Block>> {
        self.lock_calls().push(PeerCall::Blocks {
            hashes: hashes.to_vec(),
        });

        let mut blocks: Vec<Block> = hashes
            .iter()
            .filter(|hash| !self.dropped.contains(*hash))
            .filter_map(|hash| self.blocks.get(hash).cloned())
            .collect();
        if let Some(seed) = self.shuffle_seed {
            blocks.shuffle(&mut StdRng::seed_from_u64(seed));
        }
        Ok(blocks)
    }

    fn size_limits(&self) -> SizeLimits {
        self.limits
    }

    fn pre_commit(&self) -> Option<&dyn PreCommit> {
        self.hook.as_deref()
    }
}

/// Pre-commit hook that records the heights it sees and can fail on one.
#[derive(Default)]
pub struct RecordingPreCommit {
    seen: Mutex<Vec<u64>>,
    stored_before: Mutex<Vec<bool>>,
    fail_at: Option<u64>,
}

impl RecordingPreCommit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail when asked to pre-commit the block at `height`.
    pub fn fail_at(height: u64) -> Self {
        Self {
            fail_at: Some(height),
            ..Self::default()
        }
    }

    /// Heights seen, in call order.
    pub fn seen(&self) -> Vec<u64> {
        self.seen.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Whether each block was already stored when the hook ran.
    pub fn stored_before(&self) -> Vec<bool> {
        self.stored_before
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl PreCommit for RecordingPreCommit {
    async fn pre_commit(&self, block: &Block, store: &dyn ChainStore) -> Result<()> {
        let stored = store.has_block(&block.hash()).await?;
        self.stored_before
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(stored);
        self.seen
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(block.number());

        if self.fail_at == Some(block.number()) {
            return Err(SyncError::PreCommit {
                number: block.number(),
                hash: block.hash(),
                reason: "scripted failure".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::ChainFixture;
    use clustersync_core::ChainId;

    #[tokio::test]
    async fn test_headers_descend_from_parent() {
        let fixture = ChainFixture::with_seed(ChainId::Shard(0), [2; 32]);
        let blocks = fixture.build(8);
        let peer = ScriptedPeer::new(blocks.clone(), SizeLimits::new(10, 10));

        let headers = peer.fetch_headers(blocks[5].hash(), 3).await.unwrap();
        let numbers: Vec<u64> = headers.iter().map(|h| h.number).collect();
        assert_eq!(numbers, vec![5, 4, 3]);

        let all = peer.fetch_headers(blocks[2].hash(), 100).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(peer.header_requests(), 2);
    }

    #[tokio::test]
    async fn test_faults() {
        let fixture = ChainFixture::with_seed(ChainId::Shard(0), [2; 32]);
        let blocks = fixture.build(6);
        let peer = ScriptedPeer::new(blocks.clone(), SizeLimits::new(10, 10))
            .skip_header(3)
            .drop_block(blocks[1].hash());

        let headers = peer.fetch_headers(blocks[5].hash(), 10).await.unwrap();
        assert!(headers.iter().all(|h| h.number != 3));

        let wanted = [blocks[1].hash(), blocks[2].hash()];
        let fetched = peer.fetch_blocks(&wanted).await.unwrap();
        assert_eq!(fetched, vec![blocks[2].clone()]);
        assert_eq!(peer.block_requests(), vec![2]);
    }
}
