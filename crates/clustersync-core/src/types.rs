//! Strong type definitions for clustersync.
//!
//! Identifiers are newtypes so a block hash can never be confused with a
//! body hash or a key at compile time.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A 32-byte block identifier, computed as Blake3 over the sealed header.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockHash(pub [u8; 32]);

impl BlockHash {
    /// Create a new BlockHash from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| hex::FromHexError::InvalidStringLength)?;
        Ok(Self(arr))
    }

    /// The zero hash, used as the parent of a genesis header.
    pub const ZERO: Self = Self([0u8; 32]);
}

impl fmt::Debug for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockHash({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..16])
    }
}

impl AsRef<[u8]> for BlockHash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for BlockHash {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<&[u8]> for BlockHash {
    type Error = std::array::TryFromSliceError;

    fn try_from(slice: &[u8]) -> Result<Self, Self::Error> {
        let arr: [u8; 32] = slice.try_into()?;
        Ok(Self(arr))
    }
}

/// Which chain of the cluster a header belongs to.
///
/// The root chain is maintained by the master; each shard chain is
/// maintained by the slave that owns the shard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChainId {
    /// The root chain.
    Root,
    /// A shard chain, identified by its full shard id.
    Shard(u32),
}

impl ChainId {
    /// Whether this is the root chain.
    pub fn is_root(self) -> bool {
        matches!(self, ChainId::Root)
    }

    /// Compact numeric tag used in canonical encoding.
    ///
    /// The root chain is `0`; shard `n` is `n + 1`.
    pub fn to_tag(self) -> u64 {
        match self {
            ChainId::Root => 0,
            ChainId::Shard(id) => u64::from(id) + 1,
        }
    }

    /// Inverse of [`ChainId::to_tag`].
    pub fn from_tag(tag: u64) -> Option<Self> {
        match tag {
            0 => Some(ChainId::Root),
            n => u32::try_from(n - 1).ok().map(ChainId::Shard),
        }
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainId::Root => write!(f, "root"),
            ChainId::Shard(id) => write!(f, "shard-{}", id),
        }
    }
}
