//! Header: the identifying part of a block.
//!
//! Headers are immutable once sealed. A sync task only ever consumes the
//! headers it receives from a peer; it never rewrites them.

use serde::{Deserialize, Serialize};

use crate::canonical::{header_hash, seal_message};
use crate::crypto::{Blake3Hash, Ed25519PublicKey, Ed25519Signature, Keypair};
use crate::types::{BlockHash, ChainId};

/// A block header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// Chain this header belongs to.
    pub chain: ChainId,

    /// Height of the block. Genesis is 0.
    pub number: u64,

    /// Hash of the parent block ([`BlockHash::ZERO`] for genesis).
    pub parent_hash: BlockHash,

    /// Sealer-claimed timestamp (Unix milliseconds). Untrusted.
    pub timestamp: i64,

    /// Blake3 hash of the block body.
    pub body_hash: Blake3Hash,

    /// Key that produced the seal.
    pub sealer: Ed25519PublicKey,

    /// Ed25519 signature over the canonical content.
    pub seal: Ed25519Signature,
}

impl Header {
    /// Start an unsealed header.
    ///
    /// Call [`Header::seal`] to produce a header that passes seal validation.
    pub fn new(chain: ChainId, number: u64, parent_hash: BlockHash, body_hash: Blake3Hash) -> Self {
        Self {
            chain,
            number,
            parent_hash,
            timestamp: 0,
            body_hash,
            sealer: Ed25519PublicKey([0u8; 32]),
            seal: Ed25519Signature::ZERO,
        }
    }

    /// Set the timestamp.
    pub fn timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Sign the header content with the given keypair.
    pub fn seal(mut self, keypair: &Keypair) -> Self {
        self.sealer = keypair.public_key();
        self.seal = keypair.sign(&seal_message(&self));
        self
    }

    /// Compute the block hash.
    pub fn hash(&self) -> BlockHash {
        header_hash(self)
    }

    /// Whether this is a genesis header.
    pub fn is_genesis(&self) -> bool {
        self.number == 0
    }
}
