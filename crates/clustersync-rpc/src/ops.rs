//! Numbered cluster operations and the per-role operation registry.
//!
//! Operation codes are a cluster-wide contract: every node must agree on
//! them, so variants are only ever appended.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::stubs::{MasterServerSideOpClient, SlaveServerSideOpClient};

macro_rules! define_ops {
    ($($op:ident = $code:literal,)*) => {
        /// A numbered remote operation.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(u32)]
        pub enum Op {
            $($op = $code,)*
        }

        impl Op {
            /// Every operation, in code order.
            pub const ALL: &'static [Op] = &[$(Op::$op,)*];

            /// Wire code of this operation.
            pub const fn code(self) -> u32 {
                self as u32
            }

            /// Look up an operation by wire code.
            pub fn from_code(code: u32) -> Option<Op> {
                match code {
                    $($code => Some(Op::$op),)*
                    _ => None,
                }
            }

            /// Human-readable name, also used as the channel method name.
            pub const fn name(self) -> &'static str {
                match self {
                    $(Op::$op => stringify!($op),)*
                }
            }

            /// Look up an operation by name.
            pub fn from_name(name: &str) -> Option<Op> {
                match name {
                    $(stringify!($op) => Some(Op::$op),)*
                    _ => None,
                }
            }
        }
    };
}

define_ops! {
    HeartBeat = 0,
    MasterInfo = 1,
    Ping = 2,
    ConnectToSlaves = 3,
    AddRootBlock = 4,
    GetEcoInfoList = 5,
    GetNextBlockToMine = 6,
    GetUnconfirmedHeaders = 7,
    GetAccountData = 8,
    AddTransaction = 9,
    AddMinorBlockHeader = 10,
    AddXshardTxList = 11,
    SyncMinorBlockList = 12,
    AddMinorBlock = 13,
    CreateClusterPeerConnection = 14,
    GetMinorBlock = 15,
    GetTransaction = 16,
    BatchAddXshardTxList = 17,
    ExecuteTransaction = 18,
    GetTransactionReceipt = 19,
    GetMine = 20,
    GenTx = 21,
    GetTransactionListByAddress = 22,
    GetLogs = 23,
    EstimateGas = 24,
    GetStorageAt = 25,
    GetCode = 26,
    GasPrice = 27,
    GetWork = 28,
    SubmitWork = 29,
    BroadcastNewTip = 30,
    BroadcastTransactions = 31,
    BroadcastMinorBlock = 32,
    GetMinorBlocks = 33,
    GetMinorBlockHeaders = 34,
    HandleNewTip = 35,
    AddTransactions = 36,
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), self.code())
    }
}

/// Role of the remote server a client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerRole {
    /// Root-chain coordinator.
    Master,
    /// Shard worker.
    Slave,
}

impl fmt::Display for ServerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerRole::Master => write!(f, "master"),
            ServerRole::Slave => write!(f, "slave"),
        }
    }
}

/// Immutable table of the operations one server role accepts.
#[derive(Debug)]
pub struct OpRegistry {
    role: ServerRole,
    ops: &'static [Op],
}

static MASTER_REGISTRY: OpRegistry = OpRegistry {
    role: ServerRole::Master,
    ops: MasterServerSideOpClient::OPS,
};

static SLAVE_REGISTRY: OpRegistry = OpRegistry {
    role: ServerRole::Slave,
    ops: SlaveServerSideOpClient::OPS,
};

impl OpRegistry {
    /// The registry for a server role.
    pub fn for_role(role: ServerRole) -> &'static OpRegistry {
        match role {
            ServerRole::Master => &MASTER_REGISTRY,
            ServerRole::Slave => &SLAVE_REGISTRY,
        }
    }

    pub fn role(&self) -> ServerRole {
        self.role
    }

    /// Whether `code` names an operation this role accepts.
    pub fn supports(&self, code: u32) -> bool {
        self.op(code).is_some()
    }

    /// Resolve a code to an operation this role accepts.
    pub fn op(&self, code: u32) -> Option<Op> {
        self.ops.iter().copied().find(|op| op.code() == code)
    }

    /// Name of a supported operation.
    pub fn name(&self, code: u32) -> Option<&'static str> {
        self.op(code).map(Op::name)
    }

    /// All supported operations.
    pub fn ops(&self) -> &'static [Op] {
        self.ops
    }
}
