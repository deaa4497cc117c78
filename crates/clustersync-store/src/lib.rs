//! # clustersync store
//!
//! Local chain storage for clustersync. Provides a trait-based interface for
//! block persistence with SQLite and in-memory implementations.
//!
//! ## Key Types
//!
//! - [`ChainStore`] - The async trait sync tasks use to read and extend the chain
//! - [`ChainStoreExt`] - Read helpers for serving headers and blocks to peers
//! - [`SqliteChainStore`] - SQLite-based persistent storage
//! - [`MemoryChainStore`] - In-memory storage for tests
//! - [`InsertResult`] - Result of adding a block
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use clustersync_core::AuthoritySeal;
//! use clustersync_store::SqliteChainStore;
//!
//! let store = SqliteChainStore::open("chain.db", Arc::new(AuthoritySeal::open())).unwrap();
//! ```
//!
//! ## Design Notes
//!
//! - **Idempotent inserts**: Adding the same block twice returns `AlreadyExists`
//! - **Parent check**: A block is accepted only once its parent is stored
//! - **Safe under concurrency**: Many sync tasks may share one store

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryChainStore;
pub use sqlite::SqliteChainStore;
pub use traits::{ChainStore, ChainStoreExt, InsertResult};
