//! # clustersync rpc
//!
//! Numbered remote operations between cluster nodes.
//!
//! ## Overview
//!
//! Every cross-node call goes through [`RpcClient::call`]: the operation code
//! is checked against the target role's [`OpRegistry`], a call id is assigned,
//! the endpoint's connection is resolved by the [`ConnectionManager`] and the
//! request is dispatched through a typed per-role stub. One timeout bounds the
//! dial and the dispatch together.
//!
//! ```text
//! RpcClient::call(endpoint, request)
//!   |-- OpRegistry::op(code)         unsupported -> error, no dial
//!   |-- rpc_id = next id
//!   |-- ConnectionManager::get       reuse, or dial outside the lock
//!   '-- OpClient::dispatch           same deadline as the dial
//! ```
//!
//! The channel itself is abstract ([`Channel`], [`Connector`]). The
//! [`memory`] module provides an in-process network for tests.

pub mod channel;
pub mod client;
pub mod codec;
pub mod connection;
pub mod error;
pub mod memory;
pub mod message;
pub mod ops;
pub mod stubs;

pub use channel::{Channel, ConnectivityState, Connector, OpHandler};
pub use client::{ClientConfig, RpcClient, DEFAULT_TIMEOUT};
pub use codec::{decode_payload, encode_payload};
pub use connection::{ConnectionManager, OpNode};
pub use error::{Result, RpcError};
pub use memory::{MemoryChannel, MemoryConnector, MemoryNetwork, StaticHandler};
pub use message::{status_code, Reply, Request, Response, Status};
pub use ops::{Op, OpRegistry, ServerRole};
pub use stubs::{MasterServerSideOpClient, OpClient, SlaveServerSideOpClient};
