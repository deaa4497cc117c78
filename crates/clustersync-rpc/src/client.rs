//! The dispatcher: one invocation path for every numbered operation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::channel::Connector;
use crate::connection::ConnectionManager;
use crate::error::{Result, RpcError};
use crate::message::{Request, Response};
use crate::ops::{OpRegistry, ServerRole};

/// Process-wide call identifier source.
static NEXT_RPC_ID: AtomicU64 = AtomicU64::new(1);

/// Default bound on a single call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for an [`RpcClient`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Bound on each call, from connection lookup to reply.
    #[serde(rename = "timeout_ms", with = "duration_ms")]
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Calls numbered operations on servers of one role.
///
/// Safe to share between tasks; connection lookups serialize on the
/// manager's lock, the calls themselves run concurrently.
pub struct RpcClient {
    registry: &'static OpRegistry,
    connections: ConnectionManager,
    config: ClientConfig,
}

impl RpcClient {
    pub fn new(role: ServerRole, connector: Arc<dyn Connector>, config: ClientConfig) -> Self {
        Self {
            registry: OpRegistry::for_role(role),
            connections: ConnectionManager::new(role, connector, config.timeout),
            config,
        }
    }

    pub fn role(&self) -> ServerRole {
        self.registry.role()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn connections(&self) -> &ConnectionManager {
        &self.connections
    }

    /// Name of `code` if this client's role supports it.
    pub fn op_name(&self, code: u32) -> Option<&'static str> {
        self.registry.name(code)
    }

    /// Invoke `request.op` on `endpoint`.
    ///
    /// Assigns a fresh `rpc_id`, resolves the endpoint's connection and
    /// dispatches through the role's typed stub. The configured timeout bounds
    /// both steps together. Unsupported operations fail before any connection
    /// is touched.
    pub async fn call(&self, endpoint: &str, mut request: Request) -> Result<Response> {
        let op = self
            .registry
            .op(request.op)
            .ok_or(RpcError::UnsupportedOp {
                code: request.op,
                role: self.registry.role(),
            })?;

        let rpc_id = NEXT_RPC_ID.fetch_add(1, Ordering::Relaxed);
        request.rpc_id = rpc_id;

        let deadline = tokio::time::Instant::now() + self.config.timeout;
        let node = self.connections.get(endpoint).await?;

        let reply = match tokio::time::timeout_at(deadline, node.client().dispatch(op, request)).await
        {
            Ok(Some(reply)) => reply,
            Ok(None) => {
                return Err(RpcError::UnsupportedOp {
                    code: op.code(),
                    role: self.registry.role(),
                })
            }
            Err(_) => {
                tracing::warn!(endpoint, op = op.name(), rpc_id, "call timed out");
                return Err(RpcError::Timeout {
                    op: op.name(),
                    endpoint: endpoint.to_string(),
                    after: self.config.timeout,
                });
            }
        };

        match (reply.status, reply.response) {
            (Some(status), _) => Err(RpcError::Peer {
                code: status.code,
                message: status.message,
            }),
            (None, Some(response)) => Ok(response),
            (None, None) => {
                tracing::error!(endpoint, op = op.name(), rpc_id, "reply carried neither response nor status");
                Err(RpcError::EmptyReply {
                    op: op.name(),
                    endpoint: endpoint.to_string(),
                    rpc_id,
                })
            }
        }
    }

    /// Close all connections.
    pub async fn close(&self) {
        self.connections.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::Channel;
    use crate::memory::{MemoryNetwork, StaticHandler};
    use crate::message::status_code;
    use crate::ops::Op;
    use async_trait::async_trait;
    use bytes::Bytes;

    const ENDPOINT: &str = "10.0.0.2:38291";

    async fn client_with(role: ServerRole, handler: StaticHandler) -> (Arc<MemoryNetwork>, RpcClient) {
        let network = MemoryNetwork::new();
        network.register(ENDPOINT, Arc::new(handler)).await;
        let client = RpcClient::new(role, Arc::new(network.connector()), ClientConfig::default());
        (network, client)
    }

    #[tokio::test]
    async fn test_unsupported_op_never_dials() {
        let (network, client) = client_with(ServerRole::Master, StaticHandler::ok()).await;

        let result = client.call(ENDPOINT, Request::new(Op::Ping, Bytes::new())).await;
        assert!(matches!(
            result,
            Err(RpcError::UnsupportedOp {
                code: 2,
                role: ServerRole::Master
            })
        ));

        let result = client.call(ENDPOINT, Request::with_code(999, Bytes::new())).await;
        assert!(matches!(result, Err(RpcError::UnsupportedOp { code: 999, .. })));
        assert_eq!(network.dial_count(ENDPOINT).await, 0);
    }

    #[tokio::test]
    async fn test_rpc_ids_increase() {
        let (_network, client) = client_with(ServerRole::Slave, StaticHandler::ok()).await;

        let first = client.call(ENDPOINT, Request::new(Op::Ping, Bytes::new())).await.unwrap();
        let second = client.call(ENDPOINT, Request::new(Op::Ping, Bytes::new())).await.unwrap();

        assert!(first.rpc_id >= 1);
        assert!(second.rpc_id > first.rpc_id);
    }

    #[tokio::test]
    async fn test_response_data_returned() {
        let (_network, client) =
            client_with(ServerRole::Master, StaticHandler::ok_with("headers")).await;

        let response = client
            .call(ENDPOINT, Request::new(Op::GetMinorBlockHeaders, Bytes::new()))
            .await
            .unwrap();
        assert!(response.is_ok());
        assert_eq!(response.data, Bytes::from("headers"));
    }

    #[tokio::test]
    async fn test_peer_status_is_peer_error() {
        let (_network, client) = client_with(
            ServerRole::Slave,
            StaticHandler::status(status_code::INTERNAL, "boom"),
        )
        .await;

        let result = client.call(ENDPOINT, Request::new(Op::Ping, Bytes::new())).await;
        match result {
            Err(RpcError::Peer { code, message }) => {
                assert_eq!(code, status_code::INTERNAL);
                assert_eq!(message, "boom");
            }
            other => panic!("expected peer error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_reply_is_fatal() {
        let (_network, client) = client_with(ServerRole::Slave, StaticHandler::empty()).await;

        let err = client
            .call(ENDPOINT, Request::new(Op::HeartBeat, Bytes::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, RpcError::EmptyReply { op: "HeartBeat", .. }));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_call_times_out() {
        let network = MemoryNetwork::new();
        network
            .register(
                ENDPOINT,
                Arc::new(StaticHandler::ok().with_delay(Duration::from_millis(500))),
            )
            .await;
        let client = RpcClient::new(
            ServerRole::Slave,
            Arc::new(network.connector()),
            ClientConfig {
                timeout: Duration::from_millis(50),
            },
        );

        let result = client.call(ENDPOINT, Request::new(Op::Ping, Bytes::new())).await;
        assert!(matches!(result, Err(RpcError::Timeout { op: "Ping", .. })));
    }

    /// A connector whose dials never complete.
    struct HangingConnector;

    #[async_trait]
    impl Connector for HangingConnector {
        async fn connect(&self, _endpoint: &str) -> Result<Arc<dyn Channel>> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_timeout_covers_dial() {
        let client = RpcClient::new(
            ServerRole::Slave,
            Arc::new(HangingConnector),
            ClientConfig {
                timeout: Duration::from_millis(50),
            },
        );

        let result = tokio::time::timeout(
            Duration::from_secs(2),
            client.call(ENDPOINT, Request::new(Op::Ping, Bytes::new())),
        )
        .await
        .expect("call outlived its timeout");

        assert!(matches!(result, Err(RpcError::Connect { .. })));
        assert!(client.connections().is_empty().await);
    }

    #[tokio::test]
    async fn test_close_rejects_calls() {
        let (_network, client) = client_with(ServerRole::Slave, StaticHandler::ok()).await;

        client.call(ENDPOINT, Request::new(Op::Ping, Bytes::new())).await.unwrap();
        client.close().await;

        let result = client.call(ENDPOINT, Request::new(Op::Ping, Bytes::new())).await;
        assert!(matches!(result, Err(RpcError::Closed)));
    }

    #[test]
    fn test_op_name() {
        let client = RpcClient::new(
            ServerRole::Slave,
            Arc::new(MemoryNetwork::new().connector()),
            ClientConfig::default(),
        );
        assert_eq!(client.op_name(12), Some("SyncMinorBlockList"));
        assert_eq!(client.op_name(30), None);
    }

    #[test]
    fn test_config_from_json() {
        let config: ClientConfig = serde_json::from_str(r#"{"timeout_ms": 2500}"#).unwrap();
        assert_eq!(config.timeout, Duration::from_millis(2500));

        let config: ClientConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
    }
}
