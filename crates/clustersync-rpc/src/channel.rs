//! Channel abstraction for remote operations.
//!
//! A channel is one live connection to an endpoint. Implementations may use
//! gRPC, raw TCP or the in-process [`crate::memory`] network.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::message::{Reply, Request};
use crate::ops::Op;

/// Connectivity of a channel, ordered from healthiest to dead.
///
/// Anything up to and including `TransientFailure` may still recover;
/// `Shutdown` never does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConnectivityState {
    Idle,
    Connecting,
    Ready,
    TransientFailure,
    Shutdown,
}

impl ConnectivityState {
    /// Whether a channel in this state may be reused.
    pub fn is_reusable(self) -> bool {
        self <= ConnectivityState::TransientFailure
    }
}

/// A connection to one endpoint.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait Channel: Send + Sync {
    /// Current connectivity.
    fn state(&self) -> ConnectivityState;

    /// Invoke a remote method.
    ///
    /// `method` is the operation name. Transport failures come back as a
    /// [`Reply`] carrying a status.
    async fn invoke(&self, method: &'static str, request: Request) -> Reply;

    /// Release the connection. Further invocations fail.
    async fn close(&self);
}

/// Dials endpoints.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a channel to `endpoint` (`host:port`).
    async fn connect(&self, endpoint: &str) -> Result<Arc<dyn Channel>>;
}

/// Server-side handler for incoming operations.
#[async_trait]
pub trait OpHandler: Send + Sync {
    /// Handle one request for `op`.
    async fn handle(&self, op: Op, request: Request) -> Reply;
}
