//! Block: a header plus its body.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::crypto::{Blake3Hash, Keypair};
use crate::header::Header;
use crate::types::{BlockHash, ChainId};

/// Block body contents. Which variant is valid depends on the chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockBody {
    /// Root blocks confirm shard blocks by hash.
    Root { minor_headers: Vec<BlockHash> },
    /// Shard blocks carry opaque encoded transactions.
    Minor { transactions: Vec<Bytes> },
}

impl BlockBody {
    /// An empty body of the right kind for `chain`.
    pub fn empty_for(chain: ChainId) -> Self {
        match chain {
            ChainId::Root => BlockBody::Root {
                minor_headers: Vec::new(),
            },
            ChainId::Shard(_) => BlockBody::Minor {
                transactions: Vec::new(),
            },
        }
    }

    /// Compute the body hash committed to by the header.
    pub fn hash(&self) -> Blake3Hash {
        let mut hasher = blake3::Hasher::new();
        match self {
            BlockBody::Root { minor_headers } => {
                hasher.update(b"clustersync-root-body-v0:");
                hasher.update(&(minor_headers.len() as u64).to_be_bytes());
                for hash in minor_headers {
                    hasher.update(&hash.0);
                }
            }
            BlockBody::Minor { transactions } => {
                hasher.update(b"clustersync-minor-body-v0:");
                hasher.update(&(transactions.len() as u64).to_be_bytes());
                for tx in transactions {
                    hasher.update(&(tx.len() as u64).to_be_bytes());
                    hasher.update(tx);
                }
            }
        }
        Blake3Hash(*hasher.finalize().as_bytes())
    }

    /// Whether the body shape matches the chain.
    pub fn matches_chain(&self, chain: ChainId) -> bool {
        matches!(
            (self, chain),
            (BlockBody::Root { .. }, ChainId::Root) | (BlockBody::Minor { .. }, ChainId::Shard(_))
        )
    }
}

/// A full block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: Header,
    pub body: BlockBody,
}

impl Block {
    pub fn new(header: Header, body: BlockBody) -> Self {
        Self { header, body }
    }

    /// Build and seal a block whose header commits to `body`.
    pub fn sealed(
        chain: ChainId,
        number: u64,
        parent_hash: BlockHash,
        timestamp: i64,
        body: BlockBody,
        keypair: &Keypair,
    ) -> Self {
        let header = Header::new(chain, number, parent_hash, body.hash())
            .timestamp(timestamp)
            .seal(keypair);
        Self { header, body }
    }

    pub fn hash(&self) -> BlockHash {
        self.header.hash()
    }

    pub fn number(&self) -> u64 {
        self.header.number
    }
}
