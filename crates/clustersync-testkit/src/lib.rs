//! # clustersync testkit
//!
//! Testing utilities for clustersync.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: Sealed, parent-linked chains and the stores that hold them
//! - **Peers**: A scripted [`PeerFetcher`](clustersync_sync::PeerFetcher) with
//!   fault injection, and a recording pre-commit hook
//! - **Generators**: Proptest strategies for property-based testing
//!
//! ## Test Fixtures
//!
//! ```rust
//! use clustersync_core::ChainId;
//! use clustersync_testkit::fixtures::ChainFixture;
//!
//! let fixture = ChainFixture::with_seed(ChainId::Shard(0), [7; 32]);
//! let blocks = fixture.build(10);
//! let store = fixture.store_with(&blocks[..5]);
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use clustersync_testkit::generators::SyncScenario;
//!
//! proptest! {
//!     #[test]
//!     fn sync_converges(scenario: SyncScenario) {
//!         // build both chains from the scenario and run a SyncTask
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;
pub mod peers;

pub use fixtures::{hashes, serve_chain, ChainFixture};
pub use generators::SyncScenario;
pub use peers::{PeerCall, RecordingPreCommit, ScriptedPeer};
