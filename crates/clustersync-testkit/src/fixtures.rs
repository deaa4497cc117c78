//! Test fixtures and helpers.
//!
//! Builders for sealed, parent-linked chains and the stores and servers
//! that hold them.

use std::sync::Arc;

use bytes::Bytes;

use clustersync_core::{
    AuthoritySeal, Block, BlockBody, BlockHash, ChainId, Ed25519PublicKey, Keypair, SealValidator,
};
use clustersync_rpc::MemoryNetwork;
use clustersync_store::MemoryChainStore;
use clustersync_sync::BlockServer;

/// A sealer for one chain.
pub struct ChainFixture {
    pub keypair: Keypair,
    pub chain: ChainId,
}

impl ChainFixture {
    /// Create a fixture with a random keypair.
    pub fn new(chain: ChainId) -> Self {
        Self {
            keypair: Keypair::generate(),
            chain,
        }
    }

    /// Create with a deterministic keypair from seed.
    pub fn with_seed(chain: ChainId, seed: [u8; 32]) -> Self {
        Self {
            keypair: Keypair::from_seed(&seed),
            chain,
        }
    }

    pub fn public_key(&self) -> Ed25519PublicKey {
        self.keypair.public_key()
    }

    /// A validator accepting only this fixture's sealer.
    pub fn validator(&self) -> Arc<dyn SealValidator> {
        Arc::new(AuthoritySeal::with_authorities([self.keypair.public_key()]))
    }

    /// The genesis block.
    pub fn genesis(&self) -> Block {
        self.block(0, BlockHash::ZERO, 0)
    }

    /// A chain of `len` blocks starting at genesis.
    pub fn build(&self, len: usize) -> Vec<Block> {
        if len == 0 {
            return Vec::new();
        }
        let genesis = self.genesis();
        let mut blocks = vec![genesis.clone()];
        blocks.extend(self.extend(&genesis, len - 1));
        blocks
    }

    /// `count` blocks descending from `parent`.
    pub fn extend(&self, parent: &Block, count: usize) -> Vec<Block> {
        self.fork(parent, count, 0)
    }

    /// Like [`extend`](Self::extend), but `salt` makes the blocks differ from
    /// any other branch off the same parent.
    pub fn fork(&self, parent: &Block, count: usize, salt: u8) -> Vec<Block> {
        let mut blocks = Vec::with_capacity(count);
        let mut parent_hash = parent.hash();
        let mut number = parent.number();
        for _ in 0..count {
            number += 1;
            let block = self.block(number, parent_hash, salt);
            parent_hash = block.hash();
            blocks.push(block);
        }
        blocks
    }

    /// One sealed block at `number` on top of `parent`.
    pub fn block(&self, number: u64, parent: BlockHash, salt: u8) -> Block {
        let body = match self.chain {
            ChainId::Root => BlockBody::Root {
                minor_headers: Vec::new(),
            },
            ChainId::Shard(_) => BlockBody::Minor {
                transactions: vec![Bytes::from(vec![salt; 4]), Bytes::from(number.to_be_bytes().to_vec())],
            },
        };
        let timestamp = (number as i64) * 1000 + i64::from(salt);
        Block::sealed(self.chain, number, parent, timestamp, body, &self.keypair)
    }

    /// A root block confirming `minor_headers`.
    pub fn root_block(&self, number: u64, parent: BlockHash, minor_headers: Vec<BlockHash>) -> Block {
        Block::sealed(
            ChainId::Root,
            number,
            parent,
            number as i64 * 1000,
            BlockBody::Root { minor_headers },
            &self.keypair,
        )
    }

    /// A memory store holding `blocks`, which need not start at genesis.
    pub fn store_with(&self, blocks: &[Block]) -> MemoryChainStore {
        let store = MemoryChainStore::new(self.validator());
        for block in blocks {
            store
                .insert_trusted(block.clone())
                .expect("fresh store lock is never poisoned");
        }
        store
    }
}

/// Serve `store` for `chain` at `endpoint` on `network`.
pub async fn serve_chain(
    network: &MemoryNetwork,
    endpoint: &str,
    store: Arc<MemoryChainStore>,
    chain: ChainId,
) {
    network
        .register(endpoint, Arc::new(BlockServer::new(store, chain)))
        .await;
}

/// Block hashes, in the order given.
pub fn hashes(blocks: &[Block]) -> Vec<BlockHash> {
    blocks.iter().map(Block::hash).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clustersync_store::ChainStore;

    #[test]
    fn test_build_is_linked() {
        let fixture = ChainFixture::with_seed(ChainId::Shard(0), [1; 32]);
        let blocks = fixture.build(5);

        assert!(blocks[0].header.is_genesis());
        for pair in blocks.windows(2) {
            assert_eq!(pair[1].header.parent_hash, pair[0].hash());
            assert_eq!(pair[1].number(), pair[0].number() + 1);
        }
    }

    #[test]
    fn test_forks_differ() {
        let fixture = ChainFixture::with_seed(ChainId::Root, [1; 32]);
        let base = fixture.genesis();
        let a = fixture.fork(&base, 3, 1);
        let b = fixture.fork(&base, 3, 2);
        assert_ne!(a[0].hash(), b[0].hash());
        assert_eq!(a[2].number(), 3);
    }

    #[tokio::test]
    async fn test_store_with_mid_chain() {
        let fixture = ChainFixture::with_seed(ChainId::Shard(0), [1; 32]);
        let blocks = fixture.build(6);
        let store = fixture.store_with(&blocks[3..]);

        assert_eq!(store.current_header().await.unwrap().number, 5);
        assert!(!store.has_block(&blocks[0].hash()).await.unwrap());
    }
}
