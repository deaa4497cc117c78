//! In-memory implementation of the ChainStore trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use clustersync_core::{
    validate_block_body, Block, BlockHash, Header, SealValidator, ValidationError,
};

use crate::error::{Result, StoreError};
use crate::traits::{ChainStore, InsertResult};

/// In-memory chain store.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryChainStore {
    inner: RwLock<MemoryStoreInner>,
    validator: Arc<dyn SealValidator>,
}

struct MemoryStoreInner {
    /// Blocks indexed by hash.
    blocks: HashMap<BlockHash, Block>,

    /// Hash of the highest block.
    tip: Option<BlockHash>,

    /// Hashes in insertion order, for tests that assert commit order.
    insertion_order: Vec<BlockHash>,
}

impl MemoryChainStore {
    /// Create an empty store.
    pub fn new(validator: Arc<dyn SealValidator>) -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner {
                blocks: HashMap::new(),
                tip: None,
                insertion_order: Vec::new(),
            }),
            validator,
        }
    }

    /// Create a store seeded with a genesis block.
    pub fn with_genesis(genesis: Block, validator: Arc<dyn SealValidator>) -> Result<Self> {
        let store = Self::new(validator);
        store.insert(&genesis)?;
        Ok(store)
    }

    /// Insert a block, bypassing the parent check.
    ///
    /// Lets tests build a local chain that starts mid-history (for example a
    /// store whose oldest block is at height 100).
    pub fn insert_trusted(&self, block: Block) -> Result<()> {
        let mut inner = self.write()?;
        let hash = block.hash();
        if inner.blocks.contains_key(&hash) {
            return Ok(());
        }
        Self::record(&mut inner, hash, block);
        Ok(())
    }

    /// Block hashes in the order they were first stored.
    pub fn insertion_order(&self) -> Result<Vec<BlockHash>> {
        Ok(self.read()?.insertion_order.clone())
    }

    /// Number of stored blocks.
    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.blocks.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.read()?.blocks.is_empty())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner.read().map_err(|_| StoreError::Poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner.write().map_err(|_| StoreError::Poisoned)
    }

    fn insert(&self, block: &Block) -> Result<InsertResult> {
        let hash = block.hash();
        // Validation needs no lock.
        validate_block_body(block)?;
        self.validator.validate_seal(&block.header)?;

        let mut inner = self.write()?;
        if inner.blocks.contains_key(&hash) {
            return Ok(InsertResult::AlreadyExists);
        }
        if !block.header.is_genesis() && !inner.blocks.contains_key(&block.header.parent_hash) {
            return Err(StoreError::MissingParent {
                hash,
                parent: block.header.parent_hash,
                number: block.number(),
            });
        }

        Self::record(&mut inner, hash, block.clone());
        Ok(InsertResult::Inserted)
    }

    fn record(inner: &mut MemoryStoreInner, hash: BlockHash, block: Block) {
        let number = block.number();
        let advances_tip = match inner.tip.and_then(|t| inner.blocks.get(&t)) {
            Some(tip) => number > tip.number(),
            None => true,
        };
        inner.blocks.insert(hash, block);
        inner.insertion_order.push(hash);
        if advances_tip {
            inner.tip = Some(hash);
        }
    }
}

#[async_trait]
impl ChainStore for MemoryChainStore {
    async fn has_block(&self, hash: &BlockHash) -> Result<bool> {
        Ok(self.read()?.blocks.contains_key(hash))
    }

    async fn current_header(&self) -> Result<Header> {
        let inner = self.read()?;
        inner
            .tip
            .and_then(|tip| inner.blocks.get(&tip))
            .map(|block| block.header.clone())
            .ok_or(StoreError::Empty)
    }

    fn validate_seal(&self, header: &Header) -> std::result::Result<(), ValidationError> {
        self.validator.validate_seal(header)
    }

    async fn add_block(&self, block: &Block) -> Result<InsertResult> {
        self.insert(block)
    }

    async fn get_block(&self, hash: &BlockHash) -> Result<Option<Block>> {
        Ok(self.read()?.blocks.get(hash).cloned())
    }

    async fn get_header(&self, hash: &BlockHash) -> Result<Option<Header>> {
        Ok(self.read()?.blocks.get(hash).map(|b| b.header.clone()))
    }
}
