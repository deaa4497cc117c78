//! # clustersync sync
//!
//! Catch-up synchronization between cluster nodes.
//!
//! ## Overview
//!
//! When a peer announces a header the local node does not have, a
//! [`SyncTask`] reconciles the two chains:
//!
//! 1. Walk back through the peer's headers, in batches, until reaching one
//!    whose parent is stored locally.
//! 2. Download the missing blocks in windows, oldest window first.
//! 3. Commit each window in ascending height order, running the peer's
//!    optional [`PreCommit`] hook before every block.
//!
//! Forks that start too far below the local tip are abandoned with
//! [`SyncOutcome::Stale`] instead of being reconciled.
//!
//! ## Message Flow
//!
//! ```text
//! Syncing node                           Peer (BlockServer)
//!   |-- GetMinorBlockHeaders(parent) ---->|
//!   |<------------- headers, newest first |
//!   |        ... until the parent is known locally ...
//!   |-- GetMinorBlocks(oldest window) --->|
//!   |<------------------------- blocks ---|
//!   |   commit ascending, next window     |
//! ```
//!
//! ## Key Properties
//!
//! - **Idempotent**: re-running a task after a failure resumes where it
//!   stopped, since committed blocks are skipped
//! - **No rollback**: blocks committed before a failure stay committed
//! - **Bounded**: batch sizes come from [`SizeLimits`], calls are bounded by
//!   the rpc client's timeout

pub mod error;
pub mod messages;
pub mod peer;
pub mod server;
pub mod synchronizer;
pub mod task;

pub use error::{Result, SyncError};
pub use messages::{
    error_code, GetBlocksRequest, GetBlocksResponse, GetHeadersRequest, GetHeadersResponse,
    SyncMinorBlockListRequest,
};
pub use peer::{MinorBlockListSync, PeerFetcher, PreCommit, RpcPeer};
pub use server::BlockServer;
pub use synchronizer::{Synchronizer, SynchronizerStats, Task};
pub use task::{
    validate_header_list, SizeLimits, SyncConfig, SyncOutcome, SyncTask,
    DEFAULT_MAX_SYNC_STALENESS, MINOR_BLOCK_BATCH_SIZE, MINOR_BLOCK_HEADER_LIST_LIMIT,
    ROOT_BLOCK_BATCH_SIZE, ROOT_BLOCK_HEADER_LIST_LIMIT,
};
