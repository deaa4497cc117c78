//! Error types for the rpc module.

use std::time::Duration;

use thiserror::Error;

use crate::ops::ServerRole;

/// Errors that can occur while calling a remote operation.
#[derive(Debug, Error)]
pub enum RpcError {
    /// The operation code is not in the role's registry.
    #[error("operation {code} is not supported by {role} servers")]
    UnsupportedOp { code: u32, role: ServerRole },

    /// Dialing the endpoint failed.
    #[error("failed to connect to {endpoint}: {reason}")]
    Connect { endpoint: String, reason: String },

    /// The peer answered with a transport status.
    #[error("peer status {code}: {message}")]
    Peer { code: u32, message: String },

    /// The call did not complete within the configured timeout.
    #[error("{op} to {endpoint} timed out after {after:?}")]
    Timeout {
        op: &'static str,
        endpoint: String,
        after: Duration,
    },

    /// The channel returned neither a response nor a status.
    #[error("{op} to {endpoint} (rpc_id {rpc_id}) returned neither response nor status")]
    EmptyReply {
        op: &'static str,
        endpoint: String,
        rpc_id: u64,
    },

    /// The connection manager has been closed.
    #[error("connection manager closed")]
    Closed,

    /// A payload could not be encoded or decoded.
    #[error("payload codec error: {0}")]
    Codec(String),
}

impl RpcError {
    /// Whether this error indicates a broken invariant in the transport
    /// itself rather than a peer or network fault.
    pub fn is_fatal(&self) -> bool {
        matches!(self, RpcError::EmptyReply { .. })
    }
}

/// Result type for rpc operations.
pub type Result<T> = std::result::Result<T, RpcError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_empty_reply_is_fatal() {
        let empty = RpcError::EmptyReply {
            op: "Ping",
            endpoint: "127.0.0.1:38000".into(),
            rpc_id: 7,
        };
        assert!(empty.is_fatal());
        assert!(!RpcError::Closed.is_fatal());
        assert!(!RpcError::Peer {
            code: 14,
            message: "unavailable".into()
        }
        .is_fatal());
        assert!(!RpcError::Timeout {
            op: "Ping",
            endpoint: "127.0.0.1:38000".into(),
            after: Duration::from_secs(10),
        }
        .is_fatal());
    }
}
