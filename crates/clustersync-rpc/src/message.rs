//! Request, response and reply envelopes.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::ops::Op;

/// Status codes carried by a [`Status`].
pub mod status_code {
    /// Unclassified failure on the server.
    pub const UNKNOWN: u32 = 2;
    /// The request was malformed.
    pub const INVALID_ARGUMENT: u32 = 3;
    /// The server does not implement the operation.
    pub const UNIMPLEMENTED: u32 = 12;
    /// The server failed while handling the request.
    pub const INTERNAL: u32 = 13;
    /// The channel is not usable.
    pub const UNAVAILABLE: u32 = 14;
}

/// One call to a remote operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// Operation code.
    pub op: u32,
    /// Call identifier, assigned by the dispatcher at call time.
    pub rpc_id: u64,
    /// Opaque operation payload.
    pub data: Bytes,
}

impl Request {
    /// Build a request for an operation. The id is filled in when called.
    pub fn new(op: Op, data: impl Into<Bytes>) -> Self {
        Self::with_code(op.code(), data)
    }

    /// Build a request from a raw operation code.
    pub fn with_code(op: u32, data: impl Into<Bytes>) -> Self {
        Self {
            op,
            rpc_id: 0,
            data: data.into(),
        }
    }
}

/// Server-side answer to a [`Request`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub rpc_id: u64,
    /// Application-level error code; zero means success.
    pub error_code: u32,
    pub data: Bytes,
}

impl Response {
    pub fn ok(rpc_id: u64, data: impl Into<Bytes>) -> Self {
        Self {
            rpc_id,
            error_code: 0,
            data: data.into(),
        }
    }

    pub fn error(rpc_id: u64, error_code: u32) -> Self {
        Self {
            rpc_id,
            error_code,
            data: Bytes::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error_code == 0
    }
}

/// Transport-level failure reported by the peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub code: u32,
    pub message: String,
}

impl Status {
    pub fn new(code: u32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// What a channel hands back for one invocation.
///
/// Exactly one of `response` and `status` is expected to be set. A reply
/// with neither is a transport bug, not a peer fault.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    pub response: Option<Response>,
    pub status: Option<Status>,
}

impl Reply {
    pub fn response(response: Response) -> Self {
        Self {
            response: Some(response),
            status: None,
        }
    }

    pub fn status(status: Status) -> Self {
        Self {
            response: None,
            status: Some(status),
        }
    }

    /// A reply carrying nothing.
    pub fn empty() -> Self {
        Self::default()
    }
}
