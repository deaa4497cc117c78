//! # clustersync
//!
//! Catch-up synchronization for a sharded multi-chain cluster, and the
//! numbered RPC it rides on.
//!
//! ## Overview
//!
//! - **Chain store**: local blocks behind the [`ChainStore`] trait, in
//!   SQLite or in memory
//! - **RPC**: numbered cluster operations dispatched per server role, with
//!   cached connections and call timeouts
//! - **Sync**: reconcile with a peer's announced header, download the
//!   missing blocks and commit them oldest first
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use clustersync::{NodeConfig, SyncNode};
//! use clustersync::core::AuthoritySeal;
//! use clustersync::rpc::MemoryNetwork;
//! use clustersync::store::SqliteChainStore;
//!
//! async fn example(announced: clustersync::core::Header) {
//!     let store = SqliteChainStore::open("chain.db", Arc::new(AuthoritySeal::open())).unwrap();
//!     let network = MemoryNetwork::new();
//!     let config = NodeConfig::from_json(r#"{"role": "master"}"#).unwrap();
//!
//!     let node = SyncNode::new(Arc::new(store), Arc::new(network.connector()), config).unwrap();
//!     let outcome = node.sync(announced, "10.0.0.7:38291").await.unwrap();
//!     println!("{:?}", outcome);
//! }
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports the component crates for convenience:
//!
//! - `clustersync::core` - Hashes, headers, blocks, seals
//! - `clustersync::store` - Chain store abstraction, SQLite and memory stores
//! - `clustersync::rpc` - Operation registry, connections, dispatcher
//! - `clustersync::sync` - Sync tasks, peers, block server, synchronizer

pub mod config;
pub mod error;
pub mod node;

// Re-export component crates
pub use clustersync_core as core;
pub use clustersync_rpc as rpc;
pub use clustersync_store as store;
pub use clustersync_sync as sync;

// Re-export main types for convenience
pub use config::NodeConfig;
pub use error::{NodeError, Result};
pub use node::SyncNode;

pub use clustersync_core::{Block, BlockBody, BlockHash, ChainId, Header, Keypair};
pub use clustersync_rpc::{ClientConfig, Op, OpRegistry, RpcClient, RpcError, ServerRole};
pub use clustersync_store::{ChainStore, InsertResult, MemoryChainStore, SqliteChainStore};
pub use clustersync_sync::{SyncConfig, SyncError, SyncOutcome, SyncTask};
