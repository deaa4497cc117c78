//! Endpoint connection cache.
//!
//! One current [`OpNode`] per endpoint. Lookup and replacement happen under a
//! single lock; dials and calls over a resolved node happen outside it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::channel::{Channel, Connector};
use crate::error::{Result, RpcError};
use crate::ops::ServerRole;
use crate::stubs::OpClient;

/// A live connection plus the role-bound stub built over it.
#[derive(Clone)]
pub struct OpNode {
    channel: Arc<dyn Channel>,
    client: OpClient,
}

impl OpNode {
    fn new(role: ServerRole, channel: Arc<dyn Channel>) -> Self {
        let client = OpClient::for_role(role, Arc::clone(&channel));
        Self { channel, client }
    }

    pub fn channel(&self) -> &Arc<dyn Channel> {
        &self.channel
    }

    pub fn client(&self) -> &OpClient {
        &self.client
    }

    /// Whether two nodes share the same underlying channel.
    pub fn same_connection(&self, other: &OpNode) -> bool {
        Arc::as_ptr(&self.channel) as *const () == Arc::as_ptr(&other.channel) as *const ()
    }
}

impl std::fmt::Debug for OpNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpNode")
            .field("role", &self.client.role())
            .field("state", &self.channel.state())
            .finish()
    }
}

struct Connections {
    nodes: HashMap<String, OpNode>,
    closed: bool,
}

/// Caches one connection per endpoint and replaces dead ones.
pub struct ConnectionManager {
    role: ServerRole,
    connector: Arc<dyn Connector>,
    dial_timeout: Duration,
    inner: Mutex<Connections>,
}

impl ConnectionManager {
    /// Create a manager whose stubs target servers of `role`.
    ///
    /// Each dial is abandoned after `dial_timeout`.
    pub fn new(role: ServerRole, connector: Arc<dyn Connector>, dial_timeout: Duration) -> Self {
        Self {
            role,
            connector,
            dial_timeout,
            inner: Mutex::new(Connections {
                nodes: HashMap::new(),
                closed: false,
            }),
        }
    }

    pub fn role(&self) -> ServerRole {
        self.role
    }

    /// Resolve the current node for `endpoint`, dialing if needed.
    ///
    /// A cached node whose channel has shut down is closed and replaced. The
    /// lock is released while dialing, so a slow endpoint does not stall
    /// lookups for the others.
    pub async fn get(&self, endpoint: &str) -> Result<OpNode> {
        {
            let mut inner = self.inner.lock().await;
            if inner.closed {
                return Err(RpcError::Closed);
            }

            if let Some(node) = inner.nodes.get(endpoint) {
                let state = node.channel.state();
                if state.is_reusable() {
                    return Ok(node.clone());
                }
                tracing::debug!(endpoint, ?state, "replacing dead connection");
                if let Some(stale) = inner.nodes.remove(endpoint) {
                    stale.channel.close().await;
                }
            }
        }

        let channel = self.dial(endpoint).await?;

        let mut inner = self.inner.lock().await;
        if inner.closed {
            channel.close().await;
            return Err(RpcError::Closed);
        }
        // A concurrent lookup may have connected first.
        if let Some(existing) = inner.nodes.get(endpoint) {
            if existing.channel.state().is_reusable() {
                let existing = existing.clone();
                channel.close().await;
                return Ok(existing);
            }
        }

        tracing::debug!(endpoint, role = %self.role, "connected");
        let node = OpNode::new(self.role, channel);
        if let Some(stale) = inner.nodes.insert(endpoint.to_string(), node.clone()) {
            stale.channel.close().await;
        }
        Ok(node)
    }

    async fn dial(&self, endpoint: &str) -> Result<Arc<dyn Channel>> {
        match tokio::time::timeout(self.dial_timeout, self.connector.connect(endpoint)).await {
            Ok(Ok(channel)) => Ok(channel),
            Ok(Err(err)) => {
                tracing::debug!(endpoint, error = %err, "dial failed");
                Err(match err {
                    err @ RpcError::Connect { .. } => err,
                    other => RpcError::Connect {
                        endpoint: endpoint.to_string(),
                        reason: other.to_string(),
                    },
                })
            }
            Err(_) => {
                tracing::warn!(endpoint, timeout = ?self.dial_timeout, "dial timed out");
                Err(RpcError::Connect {
                    endpoint: endpoint.to_string(),
                    reason: format!("dial timed out after {:?}", self.dial_timeout),
                })
            }
        }
    }

    /// Close every cached channel. Later lookups fail with [`RpcError::Closed`].
    pub async fn close(&self) {
        let mut inner = self.inner.lock().await;
        inner.closed = true;
        for (endpoint, node) in inner.nodes.drain() {
            tracing::debug!(endpoint = %endpoint, "closing connection");
            node.channel.close().await;
        }
    }

    /// Number of cached connections.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.nodes.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
