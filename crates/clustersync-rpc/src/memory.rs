//! A simple in-memory transport for testing.
//!
//! Endpoints are registered on a shared [`MemoryNetwork`] with the handler
//! that serves them. Dialing goes through [`MemoryConnector`] and yields a
//! [`MemoryChannel`] whose connectivity tests can drive directly.

use std::collections::HashMap;
use std::sync::{Arc, RwLock as StdRwLock};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;

use crate::channel::{Channel, ConnectivityState, Connector, OpHandler};
use crate::error::{Result, RpcError};
use crate::message::{status_code, Reply, Request, Response, Status};
use crate::ops::Op;

#[derive(Default)]
struct NetworkState {
    /// Handler serving each endpoint.
    handlers: HashMap<String, Arc<dyn OpHandler>>,
    /// Most recent channel dialed to each endpoint.
    channels: HashMap<String, Arc<MemoryChannel>>,
    /// Dial attempts per endpoint, including failed ones.
    dials: HashMap<String, usize>,
}

/// Shared state for the memory transport network.
pub struct MemoryNetwork {
    state: RwLock<NetworkState>,
}

impl MemoryNetwork {
    /// Create a new memory network.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Serve `endpoint` with `handler`, replacing any previous handler.
    pub async fn register(&self, endpoint: impl Into<String>, handler: Arc<dyn OpHandler>) {
        self.state
            .write()
            .await
            .handlers
            .insert(endpoint.into(), handler);
    }

    /// Stop serving `endpoint`. Existing channels keep working.
    pub async fn unregister(&self, endpoint: &str) {
        self.state.write().await.handlers.remove(endpoint);
    }

    /// A connector dialing into this network.
    pub fn connector(self: &Arc<Self>) -> MemoryConnector {
        MemoryConnector {
            network: Arc::clone(self),
        }
    }

    /// Number of dial attempts made to `endpoint`.
    pub async fn dial_count(&self, endpoint: &str) -> usize {
        self.state
            .read()
            .await
            .dials
            .get(endpoint)
            .copied()
            .unwrap_or(0)
    }

    /// The most recent channel dialed to `endpoint`.
    pub async fn channel(&self, endpoint: &str) -> Option<Arc<MemoryChannel>> {
        self.state.read().await.channels.get(endpoint).cloned()
    }
}

impl Default for MemoryNetwork {
    fn default() -> Self {
        Self {
            state: RwLock::new(NetworkState::default()),
        }
    }
}

/// Dials endpoints registered on a [`MemoryNetwork`].
#[derive(Clone)]
pub struct MemoryConnector {
    network: Arc<MemoryNetwork>,
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, endpoint: &str) -> Result<Arc<dyn Channel>> {
        let mut state = self.network.state.write().await;
        *state.dials.entry(endpoint.to_string()).or_insert(0) += 1;

        let handler = state
            .handlers
            .get(endpoint)
            .cloned()
            .ok_or_else(|| RpcError::Connect {
                endpoint: endpoint.to_string(),
                reason: "no such endpoint".into(),
            })?;

        let channel = Arc::new(MemoryChannel {
            endpoint: endpoint.to_string(),
            handler,
            state: StdRwLock::new(ConnectivityState::Ready),
        });
        state
            .channels
            .insert(endpoint.to_string(), Arc::clone(&channel));
        Ok(channel)
    }
}

/// In-memory channel routing invocations straight to a handler.
pub struct MemoryChannel {
    endpoint: String,
    handler: Arc<dyn OpHandler>,
    state: StdRwLock<ConnectivityState>,
}

impl MemoryChannel {
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Force the channel into `state`.
    pub fn set_state(&self, state: ConnectivityState) {
        // ConnectivityState is Copy, so a poisoned lock still holds a valid value.
        let mut guard = self.state.write().unwrap_or_else(|e| e.into_inner());
        *guard = state;
    }
}

#[async_trait]
impl Channel for MemoryChannel {
    fn state(&self) -> ConnectivityState {
        *self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    async fn invoke(&self, method: &'static str, request: Request) -> Reply {
        if self.state() == ConnectivityState::Shutdown {
            return Reply::status(Status::new(
                status_code::UNAVAILABLE,
                format!("channel to {} is shut down", self.endpoint),
            ));
        }
        match Op::from_name(method) {
            Some(op) => self.handler.handle(op, request).await,
            None => Reply::status(Status::new(
                status_code::UNIMPLEMENTED,
                format!("unknown method {}", method),
            )),
        }
    }

    async fn close(&self) {
        self.set_state(ConnectivityState::Shutdown);
    }
}

enum Canned {
    Ok(Bytes),
    Status(Status),
    Empty,
}

/// Handler that answers every operation the same way.
pub struct StaticHandler {
    canned: Canned,
    delay: Option<Duration>,
}

impl StaticHandler {
    /// Answer with an empty success response echoing the request id.
    pub fn ok() -> Self {
        Self::ok_with(Bytes::new())
    }

    /// Answer with a success response carrying `data`.
    pub fn ok_with(data: impl Into<Bytes>) -> Self {
        Self {
            canned: Canned::Ok(data.into()),
            delay: None,
        }
    }

    /// Answer with a transport status.
    pub fn status(code: u32, message: impl Into<String>) -> Self {
        Self {
            canned: Canned::Status(Status::new(code, message)),
            delay: None,
        }
    }

    /// Answer with neither a response nor a status.
    pub fn empty() -> Self {
        Self {
            canned: Canned::Empty,
            delay: None,
        }
    }

    /// Sleep before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl OpHandler for StaticHandler {
    async fn handle(&self, _op: Op, request: Request) -> Reply {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.canned {
            Canned::Ok(data) => Reply::response(Response::ok(request.rpc_id, data.clone())),
            Canned::Status(status) => Reply::status(status.clone()),
            Canned::Empty => Reply::empty(),
        }
    }
}
