//! # clustersync core
//!
//! Pure primitives for clustersync: block hashes, headers, blocks, seals and
//! their canonical encoding.
//!
//! This crate contains no I/O, no storage, no networking.
//!
//! ## Key Types
//!
//! - [`Header`] - Identifies a block: number, parent hash, body hash, seal
//! - [`Block`] - A header plus a root or shard body
//! - [`BlockHash`] - Content-addressed identifier (Blake3)
//! - [`ChainId`] - Root chain or a shard chain
//! - [`SealValidator`] - The consensus rule a header's seal must satisfy
//!
//! ## Canonicalization
//!
//! Header content is encoded as deterministic CBOR. See the [`canonical`] module.

pub mod block;
pub mod canonical;
pub mod crypto;
pub mod error;
pub mod header;
pub mod types;
pub mod validation;

pub use block::{Block, BlockBody};
pub use canonical::{decode_header, encode_header, header_hash, seal_message};
pub use crypto::{Blake3Hash, Ed25519PublicKey, Ed25519Signature, Keypair};
pub use error::{CoreError, ValidationError};
pub use header::Header;
pub use types::{BlockHash, ChainId};
pub use validation::{validate_block_body, AuthoritySeal, SealValidator};
